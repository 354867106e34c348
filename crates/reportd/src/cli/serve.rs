use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use reportd_runtime::db::{ensure_schema, Database};
use reportd_runtime::gateway::{ApiServer, AppState};
use reportd_runtime::service::{IdempotencyBroker, ReportService};
use reportd_runtime::store::ReportStore;

/// Run the HTTP API server.
#[derive(Parser)]
pub struct ServeCommand {
    /// Path to a TOML config file. Configuration comes from the
    /// environment when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    pub async fn execute(self) -> Result<()> {
        let config = super::load_config(self.config.as_ref())?;
        super::init_logging(&config.log.level);

        let db = Database::connect(&config.database).await?;
        ensure_schema(db.pool()).await?;

        let store = ReportStore::new(db.pool().clone());
        let service = ReportService::new(store.clone());
        let broker = IdempotencyBroker::new(store, service.clone());

        let state = AppState {
            db: db.clone(),
            service,
            broker,
        };
        let server = ApiServer::new(config.http.clone(), state);

        let shutdown = super::shutdown_token();
        server.run(shutdown).await?;

        db.close().await;
        Ok(())
    }
}
