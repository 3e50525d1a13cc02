//! REST API
//!
//! Read access to the monitor's feed state, alerts and dashboard views, plus a
//! manual refresh trigger.

pub mod handlers;
pub mod routes;

pub use handlers::{ApiError, AppState};
pub use routes::create_router;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::monitor::Monitor;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(monitor: Arc<Monitor>, dashboard: DashboardConfig) -> Self {
        Self {
            state: AppState {
                monitor,
                dashboard: Arc::new(dashboard),
            },
        }
    }

    /// Serve until `shutdown` is cancelled
    pub async fn serve(self, addr: &str, shutdown: CancellationToken) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::internal(format!("failed to bind {addr}: {e}")))?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| Error::internal(e.to_string()))?;

        Ok(())
    }
}
