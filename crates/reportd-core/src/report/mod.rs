mod record;
mod spec;
mod state;

pub use record::{Artifact, ArtifactMeta, Execution, Report};
pub use spec::{ReportParams, ReportSpec};
pub use state::{OutputFormat, ReportState, ReportType, UnknownVariant};
