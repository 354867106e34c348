use std::collections::HashMap;

use uuid::Uuid;

use reportd_core::error::{ReportdError, Result};
use reportd_core::report::{Artifact, ArtifactMeta, Report, ReportSpec, ReportState};

use crate::store::{ListFilters, ReportStore};

/// Default page size for tenant listings.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Hard cap on requested page sizes.
pub const MAX_PAGE_SIZE: i64 = 100;

/// One page of a tenant listing, each report paired with its artifact
/// metadata when one exists.
#[derive(Debug)]
pub struct ReportPage {
    pub reports: Vec<(Report, Option<ArtifactMeta>)>,
    pub next_cursor: Option<Uuid>,
}

/// Read and create operations over report jobs.
#[derive(Clone)]
pub struct ReportService {
    store: ReportStore,
}

impl ReportService {
    pub fn new(store: ReportStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    /// Create a report job, reusing an equivalent COMPLETED or RUNNING one
    /// when present. Returns the job and whether a row was inserted.
    ///
    /// Two concurrent identical submissions may both miss the lookup and
    /// insert; the worker engine converges them onto a single artifact.
    pub async fn create(&self, spec: &ReportSpec, key: Option<&str>) -> Result<(Report, bool)> {
        let params = serde_json::to_value(&spec.params)?;
        if let Some(existing) = self
            .store
            .find_equivalent_active(&spec.tenant, spec.report_type, &params)
            .await?
        {
            tracing::debug!(
                report_id = %existing.id,
                state = %existing.state,
                "reusing equivalent report"
            );
            return Ok((existing, false));
        }

        let report = self.store.insert(spec, key).await?;
        tracing::info!(
            report_id = %report.id,
            tenant = %report.tenant_id,
            report_type = %report.report_type,
            "report created"
        );
        Ok((report, true))
    }

    /// Fetch a report and its artifact metadata.
    pub async fn get(&self, id: Uuid) -> Result<(Report, Option<ArtifactMeta>)> {
        let report = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ReportdError::NotFound(format!("report {} not found", id)))?;
        let artifact = self.store.find_artifact_meta(id).await?;
        Ok((report, artifact))
    }

    /// List a tenant's reports, newest first. `limit` defaults to
    /// [`DEFAULT_PAGE_SIZE`], must be at least 1, and is capped at
    /// [`MAX_PAGE_SIZE`].
    pub async fn list(
        &self,
        tenant: &str,
        filters: ListFilters,
        limit: Option<i64>,
        cursor: Option<Uuid>,
    ) -> Result<ReportPage> {
        let limit = match limit {
            None => DEFAULT_PAGE_SIZE,
            Some(n) if n < 1 => {
                return Err(ReportdError::Validation(format!(
                    "limit must be at least 1, got {}",
                    n
                )))
            }
            Some(n) => n.min(MAX_PAGE_SIZE),
        };

        let (reports, next_cursor) = self
            .store
            .list_by_tenant(tenant, filters, limit, cursor)
            .await?;

        let ids: Vec<Uuid> = reports.iter().map(|r| r.id).collect();
        let mut metas: HashMap<Uuid, ArtifactMeta> = self
            .store
            .find_artifact_metas(&ids)
            .await?
            .into_iter()
            .collect();

        let reports = reports
            .into_iter()
            .map(|report| {
                let meta = metas.remove(&report.id);
                (report, meta)
            })
            .collect();

        Ok(ReportPage {
            reports,
            next_cursor,
        })
    }

    /// Fetch a completed report's artifact for download.
    pub async fn artifact(&self, id: Uuid) -> Result<Artifact> {
        let report = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| ReportdError::NotFound(format!("report {} not found", id)))?;

        if report.state != ReportState::Completed {
            return Err(ReportdError::Conflict(format!(
                "report {} is {}, not COMPLETED",
                id, report.state
            )));
        }

        self.store
            .find_artifact(id)
            .await?
            .ok_or_else(|| ReportdError::NotFound(format!("artifact for report {} not found", id)))
    }
}
