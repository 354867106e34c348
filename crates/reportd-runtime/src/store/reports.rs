use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use reportd_core::error::{ReportdError, Result};
use reportd_core::report::{Report, ReportSpec, ReportState, ReportType};

use super::{map_report, ReportStore};

/// Optional filters for tenant listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilters {
    pub state: Option<ReportState>,
    pub report_type: Option<ReportType>,
}

const REPORT_COLUMNS: &str =
    "id, tenant_id, type, params, state, attempts, idempotency_key, locked_at, locked_by, \
     created_at, updated_at";

impl ReportStore {
    /// Insert a new PENDING report. A collision on the idempotency key
    /// surfaces as `UniqueViolation` for the caller to resolve.
    pub async fn insert(&self, spec: &ReportSpec, idempotency_key: Option<&str>) -> Result<Report> {
        let params = serde_json::to_value(&spec.params)?;

        let row = sqlx::query(
            r#"
            INSERT INTO reports (id, tenant_id, type, params, state, attempts, idempotency_key)
            VALUES ($1, $2, $3, $4, 'PENDING', 0, $5)
            RETURNING id, tenant_id, type, params, state, attempts, idempotency_key,
                      locked_at, locked_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&spec.tenant)
        .bind(spec.report_type.as_str())
        .bind(params)
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(ReportdError::from_sqlx)?;

        Ok(map_report(&row)?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_report).transpose()?)
    }

    pub async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Report>> {
        let row = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_report).transpose()?)
    }

    /// Find an existing COMPLETED or RUNNING report with identical
    /// submission payload. COMPLETED wins over RUNNING; ties break to the
    /// most recently created.
    pub async fn find_equivalent_active(
        &self,
        tenant: &str,
        report_type: ReportType,
        params: &serde_json::Value,
    ) -> Result<Option<Report>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM reports
            WHERE tenant_id = $1
              AND type = $2
              AND params = $3
              AND state IN ('COMPLETED', 'RUNNING')
            ORDER BY CASE state WHEN 'COMPLETED' THEN 0 ELSE 1 END, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(tenant)
        .bind(report_type.as_str())
        .bind(params)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_report).transpose()?)
    }

    /// Atomically claim the oldest eligible PENDING report for `worker_id`.
    ///
    /// Eligible means unleased, or leased before `stale_cutoff`. The inner
    /// select skips rows locked by concurrent claimants, so two workers
    /// never receive the same row. Attempts are not touched here; the
    /// counter tracks completed execution attempts.
    pub async fn claim_next_pending(
        &self,
        stale_cutoff: DateTime<Utc>,
        worker_id: &str,
    ) -> Result<Option<Report>> {
        let row = sqlx::query(
            r#"
            WITH eligible AS (
                SELECT id
                FROM reports
                WHERE state = 'PENDING'
                  AND (locked_at IS NULL OR locked_at < $1)
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE reports
            SET state = 'RUNNING', locked_at = NOW(), locked_by = $2, updated_at = NOW()
            WHERE id IN (SELECT id FROM eligible)
            RETURNING id, tenant_id, type, params, state, attempts, idempotency_key,
                      locked_at, locked_by, created_at, updated_at
            "#,
        )
        .bind(stale_cutoff)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(map_report).transpose()?)
    }

    /// Attach an idempotency key to a report that has none.
    ///
    /// Returns `None` when the row already carries a key (a concurrent
    /// submitter won). A `UniqueViolation` means another row owns this key.
    pub async fn backfill_idempotency_key(&self, id: Uuid, key: &str) -> Result<Option<Report>> {
        let row = sqlx::query(
            r#"
            UPDATE reports
            SET idempotency_key = $2, updated_at = NOW()
            WHERE id = $1 AND idempotency_key IS NULL
            RETURNING id, tenant_id, type, params, state, attempts, idempotency_key,
                      locked_at, locked_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(ReportdError::from_sqlx)?;

        Ok(row.as_ref().map(map_report).transpose()?)
    }

    /// Transition a RUNNING report held by `worker_id` to COMPLETED,
    /// clearing its lease. `attempts`, when given, is the new counter value.
    ///
    /// Returns false when the row was no longer ours (lease reclaimed or
    /// state moved on); terminal states are never re-entered.
    pub async fn mark_completed(
        &self,
        id: Uuid,
        worker_id: &str,
        attempts: Option<i32>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET state = 'COMPLETED', attempts = COALESCE($3, attempts),
                locked_at = NULL, locked_by = NULL, updated_at = NOW()
            WHERE id = $1 AND state = 'RUNNING' AND locked_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(attempts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Close out a failed attempt: back to PENDING for retry, or FAILED when
    /// attempts are exhausted. The lease is cleared either way.
    pub async fn mark_failed_or_retry(
        &self,
        id: Uuid,
        worker_id: &str,
        new_attempts: i32,
        new_state: ReportState,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET state = $3, attempts = $4,
                locked_at = NULL, locked_by = NULL, updated_at = NOW()
            WHERE id = $1 AND state = 'RUNNING' AND locked_by = $2
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(new_state.as_str())
        .bind(new_attempts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bulk-reset RUNNING reports whose lease predates `cutoff` back to
    /// PENDING. Attempts are untouched: the crashed holder never closed an
    /// attempt.
    pub async fn recover_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET state = 'PENDING', locked_at = NULL, locked_by = NULL, updated_at = NOW()
            WHERE state = 'RUNNING' AND locked_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Page through a tenant's reports, newest first with id as the
    /// tie-breaker. The cursor is the last id of the previous page; the
    /// returned cursor is present iff another page exists.
    pub async fn list_by_tenant(
        &self,
        tenant: &str,
        filters: ListFilters,
        limit: i64,
        cursor: Option<Uuid>,
    ) -> Result<(Vec<Report>, Option<Uuid>)> {
        let anchor = match cursor {
            Some(id) => {
                let created_at: Option<DateTime<Utc>> =
                    sqlx::query_scalar("SELECT created_at FROM reports WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                let created_at = created_at.ok_or_else(|| {
                    ReportdError::Validation(format!("unknown cursor: {}", id))
                })?;
                Some((created_at, id))
            }
            None => None,
        };

        let mut qb = QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE tenant_id = "
        ));
        qb.push_bind(tenant);

        if let Some(state) = filters.state {
            qb.push(" AND state = ").push_bind(state.as_str());
        }
        if let Some(report_type) = filters.report_type {
            qb.push(" AND type = ").push_bind(report_type.as_str());
        }
        if let Some((created_at, id)) = anchor {
            qb.push(" AND (created_at < ")
                .push_bind(created_at)
                .push(" OR (created_at = ")
                .push_bind(created_at)
                .push(" AND id > ")
                .push_bind(id)
                .push("))");
        }

        qb.push(" ORDER BY created_at DESC, id ASC LIMIT ");
        qb.push_bind(limit + 1);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut reports = rows
            .iter()
            .map(map_report)
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let next_cursor = if reports.len() as i64 > limit {
            reports.truncate(limit as usize);
            reports.last().map(|r| r.id)
        } else {
            None
        };

        Ok((reports, next_cursor))
    }
}
