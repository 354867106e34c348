//! The worker engine: claims report jobs, produces artifacts, and settles
//! job state.
//!
//! Each worker is an independently scheduled agent identified by a unique
//! instance id. The loop is cooperative: one claim and at most one execution
//! attempt per tick, then a sleep. Parallelism comes from running multiple
//! workers, which coordinate only through row locks and the artifact
//! uniqueness constraint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use reportd_core::error::Result;
use reportd_core::report::{Report, ReportState};

use crate::producer::ArtifactProducer;
use crate::store::{ReportStore, ARTIFACT_REPORT_ID_CONSTRAINT};

/// Worker engine configuration.
#[derive(Debug, Clone)]
pub struct WorkerEngineConfig {
    /// Unique identity of this worker instance.
    pub instance_id: String,
    /// Sleep between poll ticks.
    pub poll_interval: Duration,
    /// Age past which a RUNNING lease is presumed abandoned.
    pub stale_lock_timeout: Duration,
    /// Maximum execution attempts before a job is marked FAILED.
    pub max_attempts: i32,
    /// Stale-lease recovery runs every this many ticks (the first tick
    /// included), bounding recovery latency to
    /// `recovery_interval * poll_interval`.
    pub recovery_interval: u64,
}

impl WorkerEngineConfig {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            poll_interval: Duration::from_millis(5000),
            stale_lock_timeout: Duration::from_millis(300_000),
            max_attempts: 3,
            recovery_interval: 10,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No eligible job was available.
    Idle,
    /// A job reached COMPLETED, by producing its artifact or by finding it
    /// already present.
    Completed(Uuid),
    /// An attempt failed and the job was returned to PENDING for retry.
    Requeued(Uuid),
    /// An attempt failed and attempts are exhausted; the job is FAILED.
    Failed(Uuid),
}

/// Claims and executes report jobs against the store.
pub struct WorkerEngine {
    config: WorkerEngineConfig,
    store: ReportStore,
    producer: Arc<dyn ArtifactProducer>,
    ticks: u64,
}

impl WorkerEngine {
    pub fn new(
        config: WorkerEngineConfig,
        store: ReportStore,
        producer: Arc<dyn ArtifactProducer>,
    ) -> Self {
        Self {
            config,
            store,
            producer,
            ticks: 0,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    fn stale_cutoff(&self) -> DateTime<Utc> {
        let timeout = chrono::Duration::from_std(self.config.stale_lock_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        Utc::now() - timeout
    }

    /// Run one poll cycle: claim at most one job, execute it, and run
    /// stale-lease recovery when its turn comes around.
    ///
    /// Recovery runs after the claim so a tick that observes a stale
    /// RUNNING row returns it to PENDING instead of recovering and
    /// immediately re-claiming it in the same cycle.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let tick = self.ticks;
        self.ticks += 1;

        let outcome = match self
            .store
            .claim_next_pending(self.stale_cutoff(), &self.config.instance_id)
            .await?
        {
            None => TickOutcome::Idle,
            Some(job) => self.execute(job).await?,
        };

        if tick % self.config.recovery_interval == 0 {
            self.recover_stale().await?;
        }

        Ok(outcome)
    }

    /// Reset RUNNING jobs with expired leases back to PENDING.
    pub async fn recover_stale(&self) -> Result<u64> {
        let recovered = self.store.recover_stale(self.stale_cutoff()).await?;
        if recovered > 0 {
            tracing::warn!(
                worker_id = %self.config.instance_id,
                count = recovered,
                "recovered stale leases"
            );
        }
        Ok(recovered)
    }

    /// Execute one attempt for a claimed job.
    async fn execute(&self, job: Report) -> Result<TickOutcome> {
        let attempt = job.attempts + 1;
        tracing::debug!(
            report_id = %job.id,
            report_type = %job.report_type,
            attempt,
            "executing report job"
        );

        let execution = self.store.create_execution(job.id, attempt).await?;

        let rendered = match self.producer.produce(job.report_type, &job.params) {
            Ok(rendered) => rendered,
            Err(err) => {
                return self
                    .settle_failure(&job, execution.id, attempt, &err.to_string())
                    .await;
            }
        };

        match self
            .store
            .insert_artifact(
                job.id,
                &rendered.content_type,
                &rendered.content,
                &rendered.checksum,
            )
            .await
        {
            Ok(artifact) => {
                let settled = self
                    .store
                    .mark_completed(job.id, &self.config.instance_id, Some(attempt))
                    .await?;
                if !settled {
                    tracing::debug!(report_id = %job.id, "lease was reclaimed before completion");
                }
                self.store.close_execution(execution.id, None).await?;
                tracing::info!(
                    report_id = %job.id,
                    artifact_id = %artifact.id,
                    size_bytes = artifact.size_bytes,
                    "report completed"
                );
                Ok(TickOutcome::Completed(job.id))
            }
            Err(err) if err.is_unique_violation_on(ARTIFACT_REPORT_ID_CONSTRAINT) => {
                // Another worker already produced the artifact. The attempt
                // was a no-op, so the counter stays put.
                self.store
                    .mark_completed(job.id, &self.config.instance_id, None)
                    .await?;
                self.store.close_execution(execution.id, None).await?;
                tracing::info!(
                    report_id = %job.id,
                    "artifact already present, completed without producing a duplicate"
                );
                Ok(TickOutcome::Completed(job.id))
            }
            Err(err) => {
                self.settle_failure(&job, execution.id, attempt, &err.to_string())
                    .await
            }
        }
    }

    async fn settle_failure(
        &self,
        job: &Report,
        execution_id: Uuid,
        new_attempts: i32,
        error: &str,
    ) -> Result<TickOutcome> {
        let next_state = next_state_after_failure(new_attempts, self.config.max_attempts);

        self.store
            .mark_failed_or_retry(job.id, &self.config.instance_id, new_attempts, next_state)
            .await?;
        self.store
            .close_execution(execution_id, Some(error))
            .await?;

        match next_state {
            ReportState::Pending => {
                tracing::warn!(
                    report_id = %job.id,
                    attempt = new_attempts,
                    error,
                    "attempt failed, job requeued"
                );
                Ok(TickOutcome::Requeued(job.id))
            }
            _ => {
                tracing::error!(
                    report_id = %job.id,
                    attempts = new_attempts,
                    error,
                    "attempts exhausted, job failed"
                );
                Ok(TickOutcome::Failed(job.id))
            }
        }
    }

    /// Run the poll loop until cancelled. An in-flight attempt finishes
    /// before the loop exits; anything abandoned is recovered by peers via
    /// stale leases.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            worker_id = %self.config.instance_id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_attempts = self.config.max_attempts,
            "worker started"
        );

        loop {
            match self.tick().await {
                Ok(TickOutcome::Idle) => {}
                Ok(outcome) => {
                    tracing::debug!(worker_id = %self.config.instance_id, ?outcome, "tick settled")
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.config.instance_id, error = %e, "tick failed")
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(worker_id = %self.config.instance_id, "worker stopped");
        Ok(())
    }
}

/// PENDING while attempts remain, FAILED once they are exhausted.
fn next_state_after_failure(new_attempts: i32, max_attempts: i32) -> ReportState {
    if new_attempts < max_attempts {
        ReportState::Pending
    } else {
        ReportState::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WorkerEngineConfig::new("worker-1");
        assert_eq!(config.instance_id, "worker-1");
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.stale_lock_timeout, Duration::from_millis(300_000));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.recovery_interval, 10);
    }

    #[test]
    fn test_failure_requeues_while_attempts_remain() {
        assert_eq!(next_state_after_failure(1, 3), ReportState::Pending);
        assert_eq!(next_state_after_failure(2, 3), ReportState::Pending);
    }

    #[test]
    fn test_failure_is_terminal_at_max_attempts() {
        assert_eq!(next_state_after_failure(3, 3), ReportState::Failed);
        assert_eq!(next_state_after_failure(4, 3), ReportState::Failed);
    }

    #[test]
    fn test_single_attempt_limit_fails_immediately() {
        assert_eq!(next_state_after_failure(1, 1), ReportState::Failed);
    }
}
