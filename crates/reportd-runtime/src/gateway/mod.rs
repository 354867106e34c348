mod correlation;
mod response;
mod routes;
mod server;

pub use correlation::{CorrelationId, RequestMeta, CORRELATION_ID_HEADER};
pub use response::{ApiError, ArtifactBody, HealthBody, ListBody, ReportBody};
pub use server::{ApiServer, AppState};
