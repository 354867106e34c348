use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::spec::ReportParams;
use super::state::{ReportState, ReportType};

/// A persisted report job.
#[derive(Debug, Clone)]
pub struct Report {
    pub id: Uuid,
    pub tenant_id: String,
    pub report_type: ReportType,
    pub params: ReportParams,
    pub state: ReportState,
    /// Number of completed execution attempts. Monotonically non-decreasing.
    pub attempts: i32,
    /// Client-supplied dedup token. Globally unique when present.
    pub idempotency_key: Option<String>,
    /// Lease: set together with `locked_by` while the job is RUNNING.
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The produced output of a report job. At most one per job, never mutated.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub report_id: Uuid,
    pub content_type: String,
    pub content: Vec<u8>,
    pub size_bytes: i64,
    /// SHA-256 hex digest of `content`.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Artifact metadata without the content bytes, for job representations.
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub id: Uuid,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Artifact> for ArtifactMeta {
    fn from(a: &Artifact) -> Self {
        Self {
            id: a.id,
            content_type: a.content_type.clone(),
            size_bytes: a.size_bytes,
            checksum: a.checksum.clone(),
            created_at: a.created_at,
        }
    }
}

/// Audit record of one execution attempt. Rows left without `finished_at`
/// belong to crashed workers and are acceptable residue.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: Uuid,
    pub report_id: Uuid,
    /// 1-based attempt ordinal.
    pub attempt: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}
