use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use reportd_runtime::db::{ensure_schema, Database};
use reportd_runtime::producer::ReportRenderer;
use reportd_runtime::store::ReportStore;
use reportd_runtime::worker::{WorkerEngine, WorkerEngineConfig};

/// Run a report worker.
#[derive(Parser)]
pub struct WorkerCommand {
    /// Path to a TOML config file. Configuration comes from the
    /// environment when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl WorkerCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(self.config.as_ref())?;
        super::init_logging(&config.log.level);

        let db = Database::connect(&config.database).await?;
        ensure_schema(db.pool()).await?;

        let instance_id = config
            .worker
            .instance_id
            .clone()
            .unwrap_or_else(super::default_instance_id);

        let engine_config = WorkerEngineConfig {
            poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
            stale_lock_timeout: Duration::from_millis(config.worker.stale_lock_timeout_ms),
            max_attempts: config.worker.max_attempts,
            ..WorkerEngineConfig::new(instance_id)
        };

        let store = ReportStore::new(db.pool().clone());
        let engine = WorkerEngine::new(engine_config, store, Arc::new(ReportRenderer::new()));

        let shutdown = super::shutdown_token();
        engine.run(shutdown).await?;

        db.close().await;
        Ok(())
    }
}
