use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use reportd_core::config::HttpConfig;
use reportd_core::error::Result;

use crate::db::Database;
use crate::service::{IdempotencyBroker, ReportService};

use super::correlation::correlation_middleware;
use super::routes;

/// Shared state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub service: ReportService,
    pub broker: IdempotencyBroker,
}

/// The reportd HTTP API server.
pub struct ApiServer {
    config: HttpConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: HttpConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/reports", post(routes::submit_report))
            .route("/reports/{id}", get(routes::get_report))
            .route("/reports/{id}/download", get(routes::download_artifact))
            .route("/tenants/{tenant}/reports", get(routes::list_reports))
            .route("/health", get(routes::health))
            .fallback(routes::not_found)
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn(correlation_middleware)),
            )
    }

    /// The socket address to bind to.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.config.port))
    }

    /// Serve until the token is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(%addr, "API server listening");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReportStore;
    use sqlx::postgres::PgPoolOptions;

    fn server_with_port(port: u16) -> ApiServer {
        // A lazy pool parses the URL without connecting, which is all the
        // router needs to exist.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/reports")
            .unwrap();
        let db = Database::from_pool(pool.clone());
        let store = ReportStore::new(pool);
        let service = ReportService::new(store.clone());
        let broker = IdempotencyBroker::new(store, service.clone());
        ApiServer::new(
            HttpConfig { port },
            AppState {
                db,
                service,
                broker,
            },
        )
    }

    #[tokio::test]
    async fn test_addr_uses_configured_port() {
        let server = server_with_port(3210);
        assert_eq!(server.addr().port(), 3210);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let server = server_with_port(3000);
        let _router = server.router();
    }
}
