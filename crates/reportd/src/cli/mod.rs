mod serve;
mod worker;

pub use serve::ServeCommand;
pub use worker::WorkerCommand;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use reportd_core::config::ReportdConfig;

/// reportd - asynchronous report generation service.
#[derive(Parser)]
#[command(name = "reportd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server.
    Serve(ServeCommand),

    /// Run a report worker.
    Worker(WorkerCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve(cmd) => cmd.execute().await,
            Commands::Worker(cmd) => cmd.execute().await,
        }
    }
}

/// Load configuration from a TOML file when given, from the environment
/// otherwise.
pub(crate) fn load_config(path: Option<&PathBuf>) -> Result<ReportdConfig> {
    let config = match path {
        Some(path) => ReportdConfig::from_file(path)?,
        None => ReportdConfig::from_env()?,
    };
    Ok(config)
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured
/// level when set.
pub(crate) fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// A token cancelled on SIGTERM or SIGINT.
pub(crate) fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();

    let signal_token = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        signal_token.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Worker identity when none is configured: host, pid, and a random tail.
pub(crate) fn default_instance_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let tail = uuid::Uuid::new_v4().simple().to_string();

    format!("{}-{}-{}", host, std::process::id(), &tail[..8])
}
