//! HTTP client for the analytics feed

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::models::TelemetryRecord;

use super::normalizer::Normalizer;

/// Fetches and normalizes the telemetry feed
///
/// Each call issues a single best-effort GET. No timeout or retry is applied
/// beyond the transport's own behavior.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
    normalizer: Normalizer,
}

impl FeedClient {
    /// Create a feed client from configuration
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            normalizer: Normalizer::telemetry(),
        })
    }

    /// Feed endpoint
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw positional rows
    ///
    /// A non-success status or an unparsable body is an error. An absent or
    /// non-array `result.data_array` yields no rows.
    pub async fn fetch_rows(&self) -> Result<Vec<Value>> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FeedStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let json: Value = serde_json::from_slice(&body)?;

        let rows = match json.pointer("/result/data_array") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => {
                warn!(kind = json_kind(other), "Feed data_array is not an array");
                Vec::new()
            }
            None => Vec::new(),
        };

        debug!(url = %self.url, rows = rows.len(), "Fetched feed");
        Ok(rows)
    }

    /// Fetch and normalize the feed into telemetry records
    pub async fn fetch(&self) -> Result<Vec<TelemetryRecord>> {
        let rows = self.fetch_rows().await?;
        Ok(self
            .normalizer
            .normalize(&rows)
            .iter()
            .map(TelemetryRecord::from)
            .collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> FeedClient {
        let config = FeedConfig {
            url: format!("{}/api/GetDatabricksData", server.uri()),
            ..FeedConfig::default()
        };
        FeedClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_normalizes_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/GetDatabricksData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "data_array": [
                        ["PUMP-1", null, "r-1", "false", null, "30", "900", "70", "1500", "ON",
                         "SEG-1", "50", "2025-03-01T10:00:00Z", "OPEN"]
                    ]
                }
            })))
            .mount(&server)
            .await;

        let records = client_for(&server).await.fetch().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].segment_id, "SEG-1");
        assert_eq!(records[0].metric("pressure"), Some(70.0));
        assert_eq!(records[0].metric("flow_rate"), Some(900.0));
    }

    #[tokio::test]
    async fn test_missing_data_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;

        let rows = client_for(&server).await.fetch_rows().await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_non_array_data_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": {"data_array": "oops"}})),
            )
            .mount(&server)
            .await;

        let rows = client_for(&server).await.fetch_rows().await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch().await.unwrap_err();
        assert!(matches!(err, Error::FeedStatus { status: 503 }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.fetch().await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
