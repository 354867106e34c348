//! Persistence adapter for the three report tables.
//!
//! All coordination between submitters and workers flows through the
//! uniqueness constraints and row-level locks declared in the schema; the
//! adapter exposes them as explicit operations and never hides a
//! `UniqueViolation` behind a generic failure.

mod artifacts;
mod executions;
mod reports;

pub use reports::ListFilters;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use reportd_core::report::{Artifact, ArtifactMeta, Execution, Report};

/// Constraint guarding one job per idempotency key.
pub const IDEMPOTENCY_KEY_CONSTRAINT: &str = "reports_idempotency_key_key";

/// Constraint guarding one artifact per job; the convergence signal.
pub const ARTIFACT_REPORT_ID_CONSTRAINT: &str = "report_artifacts_report_id_key";

/// Transactional operations on reports, artifacts, and executions.
#[derive(Clone)]
pub struct ReportStore {
    pool: PgPool,
}

impl ReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_err(
    column: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

pub(crate) fn map_report(row: &PgRow) -> Result<Report, sqlx::Error> {
    let report_type: String = row.try_get("type")?;
    let state: String = row.try_get("state")?;
    let params: serde_json::Value = row.try_get("params")?;

    Ok(Report {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        report_type: report_type.parse().map_err(|e| decode_err("type", e))?,
        params: serde_json::from_value(params).map_err(|e| decode_err("params", e))?,
        state: state.parse().map_err(|e| decode_err("state", e))?,
        attempts: row.try_get("attempts")?,
        idempotency_key: row.try_get("idempotency_key")?,
        locked_at: row.try_get("locked_at")?,
        locked_by: row.try_get("locked_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn map_artifact(row: &PgRow) -> Result<Artifact, sqlx::Error> {
    Ok(Artifact {
        id: row.try_get("id")?,
        report_id: row.try_get("report_id")?,
        content_type: row.try_get("content_type")?,
        content: row.try_get("content")?,
        size_bytes: row.try_get("size_bytes")?,
        checksum: row.try_get("checksum")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn map_artifact_meta(row: &PgRow) -> Result<ArtifactMeta, sqlx::Error> {
    Ok(ArtifactMeta {
        id: row.try_get("id")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        checksum: row.try_get("checksum")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn map_execution(row: &PgRow) -> Result<Execution, sqlx::Error> {
    Ok(Execution {
        id: row.try_get("id")?,
        report_id: row.try_get("report_id")?,
        attempt: row.try_get("attempt")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        error: row.try_get("error")?,
    })
}
