mod idempotency;
mod reports;

pub use idempotency::{IdempotencyBroker, Submission};
pub use reports::{ReportPage, ReportService};
