//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Feed state
        .route("/api/v1/status", get(handlers::get_status))
        .route("/api/v1/refresh", post(handlers::refresh))

        // Alerts
        .route("/api/v1/alerts", get(handlers::list_alerts))

        // Dashboard views
        .route("/api/v1/devices", get(handlers::list_devices))
        .route("/api/v1/devices/:device_id/snapshot", get(handlers::get_device_snapshot))
        .route("/api/v1/devices/:device_id/series", get(handlers::get_device_series))

        .with_state(state)
}
