use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use reportd_core::config::DatabaseConfig;
use reportd_core::error::{ReportdError, Result};

/// Connection pool handle for the primary store.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| ReportdError::Config(format!("failed to connect to database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Trivial connectivity probe backing the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
