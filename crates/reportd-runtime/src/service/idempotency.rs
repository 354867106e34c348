use reportd_core::error::{ReportdError, Result};
use reportd_core::report::{Report, ReportSpec};

use crate::store::{ReportStore, IDEMPOTENCY_KEY_CONSTRAINT};

use super::reports::ReportService;

/// Outcome of resolving a submission to its canonical job.
#[derive(Debug)]
pub struct Submission {
    pub report: Report,
    /// Whether this submission inserted a new row.
    pub created: bool,
}

/// Resolves a submission and optional client key to the single job that
/// represents it, creating one only when no eligible job exists.
///
/// The key lookup and payload reuse here are advisory: they minimize wasted
/// work under races, while the unique index on the key column and the worker
/// engine's artifact convergence carry the hard guarantees.
#[derive(Clone)]
pub struct IdempotencyBroker {
    store: ReportStore,
    service: ReportService,
}

impl IdempotencyBroker {
    pub fn new(store: ReportStore, service: ReportService) -> Self {
        Self { store, service }
    }

    pub async fn resolve(&self, spec: &ReportSpec, key: Option<&str>) -> Result<Submission> {
        // Key hit: the submission was already accepted.
        if let Some(key) = key {
            if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
                tracing::debug!(report_id = %existing.id, "idempotency key hit");
                return Ok(Submission {
                    report: existing,
                    created: false,
                });
            }
        }

        // Semantic hit or fresh insert. The insert carries the key, so a
        // concurrent submitter racing us on the same key loses to the unique
        // index and we return the winning row instead.
        let (report, created) = match self.service.create(spec, key).await {
            Ok(pair) => pair,
            Err(err) if err.is_unique_violation_on(IDEMPOTENCY_KEY_CONSTRAINT) => {
                return self.resolve_key_collision(key).await;
            }
            Err(err) => return Err(err),
        };

        if created {
            return Ok(Submission {
                report,
                created: true,
            });
        }

        // Payload reuse chose an existing row: attach the client key to it
        // if it has none, so later retries short-circuit on the key lookup.
        if let Some(key) = key {
            if report.idempotency_key.is_none() {
                match self.store.backfill_idempotency_key(report.id, key).await {
                    Ok(Some(updated)) => {
                        return Ok(Submission {
                            report: updated,
                            created: false,
                        })
                    }
                    // The row acquired a different key concurrently; it
                    // still answers this submission.
                    Ok(None) => {}
                    Err(err) if err.is_unique_violation_on(IDEMPOTENCY_KEY_CONSTRAINT) => {
                        return self.resolve_key_collision(Some(key)).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(Submission {
            report,
            created: false,
        })
    }

    /// A unique violation on the key column means a concurrent submitter
    /// owns the key now; that row is the authoritative answer.
    async fn resolve_key_collision(&self, key: Option<&str>) -> Result<Submission> {
        let key = key.ok_or_else(|| {
            ReportdError::Internal("idempotency key collision without a key".to_string())
        })?;
        let report = self
            .store
            .find_by_idempotency_key(key)
            .await?
            .ok_or_else(|| {
                ReportdError::Internal(format!(
                    "idempotency key {} collided but no row was found",
                    key
                ))
            })?;
        tracing::debug!(report_id = %report.id, "resolved idempotency key collision");
        Ok(Submission {
            report,
            created: false,
        })
    }
}
