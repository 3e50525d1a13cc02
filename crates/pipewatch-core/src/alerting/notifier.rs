//! Notification delivery for alerts

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::Alert;

/// Body posted to the email relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Recipient addresses
    pub to: Vec<String>,
    /// Email subject
    pub subject: String,
    /// Plain-text email body
    pub body: String,
}

impl NotificationPayload {
    /// Compose the breach notification for an alert
    pub fn for_alert(alert: &Alert, recipients: &[String]) -> Self {
        let mut body = String::from("An anomaly has been detected.\n");
        let _ = writeln!(body, "Segment: {}", alert.segment_id);
        let _ = writeln!(body, "Metric: {}", alert.metric);
        let _ = writeln!(body, "Previous Value: {}", alert.previous_value);
        let _ = writeln!(body, "Current Value: {}", alert.current_value);
        let _ = writeln!(body, "Threshold: {}", alert.threshold);
        let _ = writeln!(body, "Severity: {}", alert.severity);
        let _ = write!(body, "Timestamp: {}", alert.timestamp);

        Self {
            to: recipients.to_vec(),
            subject: format!("Threshold Breach: {}", alert.title),
            body,
        }
    }
}

/// Outcome of a send call that reached the channel
///
/// Any HTTP response counts, including error statuses.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Channel name
    pub channel: String,
    /// HTTP status, when the channel speaks HTTP
    pub status: Option<u16>,
    /// When the send completed
    pub sent_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    /// Whether the peer acknowledged the notification
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |s| (200..300).contains(&s))
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Client setup or transport failure
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A channel that carries breach notifications
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name for logs
    fn name(&self) -> &str;

    /// Issue a single best-effort send
    async fn send(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError>;
}

/// Posts notifications to an HTTP email relay
///
/// The body is the JSON-encoded payload sent with a form-url-encoded content
/// type, which is what the relay expects.
pub struct HttpNotificationChannel {
    client: Client,
    url: String,
}

impl HttpNotificationChannel {
    /// Create a channel posting to `url`
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .user_agent(concat!("pipewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationChannel for HttpNotificationChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| NotificationError::SerializationError(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(url = %self.url, status = %status, body = %text, "Email relay rejected notification");
        }

        Ok(DeliveryReceipt {
            channel: self.name().to_string(),
            status: Some(status.as_u16()),
            sent_at: Utc::now(),
        })
    }
}

/// Logs notifications instead of sending them
#[derive(Debug, Default)]
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(
        &self,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        info!(
            recipients = ?payload.to,
            subject = %payload.subject,
            "Dry run: notification not sent"
        );

        Ok(DeliveryReceipt {
            channel: self.name().to_string(),
            status: None,
            sent_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertId, Severity};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        Alert {
            id: AlertId::for_pair("SEG-1", "pressure"),
            segment_id: "SEG-1".to_string(),
            metric: "pressure".to_string(),
            title: "SEG-1 - Pressure (psi)".to_string(),
            previous_value: 70.0,
            current_value: 85.0,
            threshold: 80.0,
            severity: Severity::Critical,
            timestamp: "2025-03-01T10:05:00Z".to_string(),
        }
    }

    #[test]
    fn test_payload_contents() {
        let payload = NotificationPayload::for_alert(&alert(), &["ops@plant.example".to_string()]);

        assert_eq!(payload.to, vec!["ops@plant.example"]);
        assert_eq!(payload.subject, "Threshold Breach: SEG-1 - Pressure (psi)");
        for line in [
            "Segment: SEG-1",
            "Metric: pressure",
            "Previous Value: 70",
            "Current Value: 85",
            "Threshold: 80",
            "Severity: CRITICAL",
            "Timestamp: 2025-03-01T10:05:00Z",
        ] {
            assert!(payload.body.contains(line), "missing {line:?}");
        }
    }

    #[tokio::test]
    async fn test_http_channel_posts_json_as_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send-email"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = HttpNotificationChannel::new(format!("{}/api/send-email", server.uri())).unwrap();
        let payload = NotificationPayload::for_alert(&alert(), &["ops@plant.example".to_string()]);

        let receipt = channel.send(&payload).await.unwrap();
        assert!(receipt.is_success());

        let requests = server.received_requests().await.unwrap();
        let sent: NotificationPayload = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent, payload);
    }

    #[tokio::test]
    async fn test_http_error_status_is_still_a_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let channel = HttpNotificationChannel::new(server.uri()).unwrap();
        let payload = NotificationPayload::for_alert(&alert(), &[]);

        let receipt = channel.send(&payload).await.unwrap();
        assert_eq!(receipt.status, Some(500));
        assert!(!receipt.is_success());
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let url = format!("http://127.0.0.1:{port}/api/send-email");

        let channel = HttpNotificationChannel::new(url).unwrap();
        let payload = NotificationPayload::for_alert(&alert(), &[]);

        assert!(matches!(
            channel.send(&payload).await,
            Err(NotificationError::HttpError(_))
        ));
    }
}
