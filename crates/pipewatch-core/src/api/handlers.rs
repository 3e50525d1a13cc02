//! API handlers for the HTTP REST API

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DashboardConfig;
use crate::dashboard::{device_ids, device_series, DeviceSnapshot, MetricSeries, SnapshotQuery};
use crate::error::Error;
use crate::models::{Alert, StatusFilter};
use crate::monitor::{FeedState, Monitor, MonitorStatus, Snapshot};

/// Route that retries a failed fetch
pub const REFRESH_ROUTE: &str = "/api/v1/refresh";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Monitor owning the feed state
    pub monitor: Arc<Monitor>,
    /// KPI thresholds and chart bands
    pub dashboard: Arc<DashboardConfig>,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error message
    pub error: String,
    /// Route to call to retry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
}

/// Handler error rendered as a JSON body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                retry: None,
            },
        }
    }

    /// The latest feed fetch failed; points the caller at the refresh route
    fn feed_failed(message: impl Into<String>) -> Self {
        let mut err = Self::new(StatusCode::BAD_GATEWAY, message);
        err.body.retry = Some(REFRESH_ROUTE.to_string());
        err
    }

    fn not_found(what: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found: {id}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn ready_snapshot(monitor: &Monitor) -> Result<Arc<Snapshot>, ApiError> {
    match monitor.state() {
        FeedState::Ready(snapshot) => Ok(snapshot),
        FeedState::Failed { message, .. } => Err(ApiError::feed_failed(message)),
        FeedState::Idle | FeedState::Loading => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "feed is loading",
        )),
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: String,
    /// Crate version
    pub version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Feed state summary
pub async fn get_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.status())
}

/// Run a synthesis pass now
///
/// Notifications for the pass go out in the background.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<MonitorStatus>, ApiError> {
    match state.monitor.refresh().await {
        Ok(_) => Ok(Json(state.monitor.status())),
        Err(Error::Cancelled) => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "monitor is shutting down",
        )),
        Err(e) => Err(ApiError::feed_failed(e.to_string())),
    }
}

/// Query parameters for listing alerts
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    /// `ALL`, `CRITICAL` or `WARNING`, case-insensitive
    pub status: Option<String>,
}

/// List alerts response
#[derive(Serialize)]
pub struct AlertsResponse {
    /// Filter applied
    pub filter: StatusFilter,
    /// Completion time of the fetch the alerts come from
    pub fetched_at: DateTime<Utc>,
    /// Number of alerts returned
    pub total: usize,
    /// Alerts passing the filter, in synthesis order
    pub alerts: Vec<AlertView>,
}

/// An alert as listed by the API
#[derive(Serialize)]
pub struct AlertView {
    /// The alert
    #[serde(flatten)]
    pub alert: Alert,
    /// Distance between the latest reading and the threshold, one decimal
    pub exceeded_by: f64,
}

impl From<&Alert> for AlertView {
    fn from(alert: &Alert) -> Self {
        Self {
            exceeded_by: (alert.threshold_gap() * 10.0).round() / 10.0,
            alert: alert.clone(),
        }
    }
}

/// List actionable alerts of the current snapshot
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let filter = match query.status.as_deref() {
        Some(raw) => raw
            .parse::<StatusFilter>()
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => StatusFilter::All,
    };

    let snapshot = ready_snapshot(&state.monitor)?;
    let alerts: Vec<AlertView> = filter
        .apply(&snapshot.alerts)
        .into_iter()
        .map(AlertView::from)
        .collect();
    debug!(filter = %filter, count = alerts.len(), "Listing alerts");

    Ok(Json(AlertsResponse {
        filter,
        fetched_at: snapshot.fetched_at,
        total: alerts.len(),
        alerts,
    }))
}

/// List devices response
#[derive(Serialize)]
pub struct DevicesResponse {
    /// Distinct device ids in feed order
    pub devices: Vec<String>,
    /// Number of devices
    pub total: usize,
}

/// Distinct devices of the current snapshot
pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let snapshot = ready_snapshot(&state.monitor)?;
    let devices = device_ids(&snapshot.records);
    let total = devices.len();
    Ok(Json(DevicesResponse { devices, total }))
}

/// Query parameters for a device snapshot
#[derive(Debug, Deserialize)]
pub struct DeviceSnapshotQuery {
    /// `YYYY-MM-DD`
    pub date: Option<NaiveDate>,
    /// `HH:MM`
    pub time: Option<String>,
}

/// KPI tiles for one device
pub async fn get_device_snapshot(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<DeviceSnapshotQuery>,
) -> Result<Json<DeviceSnapshot>, ApiError> {
    let snapshot = ready_snapshot(&state.monitor)?;
    let query = SnapshotQuery {
        date: query.date,
        time: query.time,
    };

    DeviceSnapshot::build(&snapshot.records, &device_id, &query, &state.dashboard.kpi)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("reading for device", &device_id))
}

/// Chart series for one device
pub async fn get_device_series(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<MetricSeries>>, ApiError> {
    let snapshot = ready_snapshot(&state.monitor)?;
    if !snapshot.records.iter().any(|r| r.segment_id == device_id) {
        return Err(ApiError::not_found("device", &device_id));
    }

    Ok(Json(device_series(
        &snapshot.records,
        &device_id,
        &state.dashboard.bands,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertEvaluator;
    use crate::api::create_router;
    use crate::config::FeedConfig;
    use crate::feed::FeedClient;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(segment: &str, pressure: &str, ts: &str) -> Value {
        json!([
            "PUMP-1", null, null, "false", null, "10", "500", pressure, "1500", "ON",
            segment, "20", ts, "OPEN"
        ])
    }

    async fn feed(status: u16) -> MockServer {
        let server = MockServer::start().await;
        let rows = json!([
            row("SEG-1", "70", "2025-03-01T10:00:00Z"),
            row("SEG-1", "85", "2025-03-01T10:05:00Z"),
            row("SEG-2", "70", "2025-03-01T10:00:00Z"),
            row("SEG-2", "77", "2025-03-01T10:05:00Z"),
        ]);
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({ "result": { "data_array": rows } })),
            )
            .mount(&server)
            .await;
        server
    }

    fn state_for(server: &MockServer) -> AppState {
        let feed = FeedClient::new(&FeedConfig {
            url: server.uri(),
            poll_interval: None,
        })
        .unwrap();
        AppState {
            monitor: Arc::new(Monitor::new(feed, AlertEvaluator::default(), None)),
            dashboard: Arc::new(DashboardConfig::default()),
        }
    }

    async fn call(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let server = feed(200).await;
        let (status, body) = call(&state_for(&server), "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_alerts_before_first_fetch() {
        let server = feed(200).await;
        let (status, body) = call(&state_for(&server), "GET", "/api/v1/alerts").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "feed is loading");
    }

    #[tokio::test]
    async fn test_alerts_after_failed_fetch_offer_retry() {
        let server = feed(503).await;
        let state = state_for(&server);

        let (status, body) = call(&state, "POST", "/api/v1/refresh").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["retry"], REFRESH_ROUTE);

        let (status, body) = call(&state, "GET", "/api/v1/alerts").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Feed returned HTTP 503");
        assert_eq!(body["retry"], REFRESH_ROUTE);
    }

    #[tokio::test]
    async fn test_alerts_filtered_by_status() {
        let server = feed(200).await;
        let state = state_for(&server);
        state.monitor.refresh().await.unwrap();

        let (status, body) = call(&state, "GET", "/api/v1/alerts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["filter"], "ALL");

        let (_, body) = call(&state, "GET", "/api/v1/alerts?status=critical").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["alerts"][0]["id"], "SEG-1:pressure");
        assert_eq!(body["alerts"][0]["severity"], "CRITICAL");
        assert_eq!(body["alerts"][0]["exceeded_by"], 5.0);

        let (_, body) = call(&state, "GET", "/api/v1/alerts?status=WARNING").await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["alerts"][0]["segment_id"], "SEG-2");
        assert_eq!(body["alerts"][0]["exceeded_by"], 3.0);
    }

    #[tokio::test]
    async fn test_alerts_rejects_unknown_status() {
        let server = feed(200).await;
        let state = state_for(&server);
        state.monitor.refresh().await.unwrap();

        let (status, _) = call(&state, "GET", "/api/v1/alerts?status=normal").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_reports_ready() {
        let server = feed(200).await;
        let state = state_for(&server);

        let (status, body) = call(&state, "POST", "/api/v1/refresh").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "ready");
        assert_eq!(body["records"], 4);
        assert_eq!(body["actionable"], 2);
    }

    #[tokio::test]
    async fn test_device_views() {
        let server = feed(200).await;
        let state = state_for(&server);
        state.monitor.refresh().await.unwrap();

        let (_, body) = call(&state, "GET", "/api/v1/devices").await;
        assert_eq!(body["devices"], json!(["SEG-1", "SEG-2"]));

        let (status, body) = call(&state, "GET", "/api/v1/devices/SEG-1/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["device_id"], "SEG-1");
        assert_eq!(body["pressure"]["value"], "85.00");

        let (status, body) = call(&state, "GET", "/api/v1/devices/SEG-1/series").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, _) = call(&state, "GET", "/api/v1/devices/SEG-9/series").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
