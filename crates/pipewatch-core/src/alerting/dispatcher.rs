//! Breach notification dispatch with a dedup guard

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::models::Alert;

use super::dedup::NotifiedStore;
use super::notifier::{NotificationChannel, NotificationPayload};

/// What happened to one alert during dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Severity below warning; never notified
    NotActionable,
    /// A notification was already sent for this identity
    AlreadyNotified,
    /// The send call went out and the identity was recorded
    Sent,
    /// The send call or the store failed; the identity was not recorded
    Failed,
}

/// Counters for one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Warning or critical alerts seen
    pub considered: usize,
    /// Notifications sent
    pub sent: usize,
    /// Alerts skipped because they were already notified
    pub skipped: usize,
    /// Alerts whose send or bookkeeping failed
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::NotActionable => return,
            DispatchOutcome::AlreadyNotified => self.skipped += 1,
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
        self.considered += 1;
    }
}

/// Sends at most one notification per alert identity
///
/// The identity is recorded once the send call returns, whatever HTTP status
/// the channel got back. A send call that errors leaves the identity
/// unrecorded, so a later pass may try again.
///
/// Clones share one dispatch lock: the lookup, send and insert for an
/// identity never interleave with another dispatch run.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotifiedStore>,
    channel: Arc<dyn NotificationChannel>,
    recipients: Vec<String>,
    serial: Arc<Mutex<()>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher
    pub fn new(
        store: Arc<dyn NotifiedStore>,
        channel: Arc<dyn NotificationChannel>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            store,
            channel,
            recipients,
            serial: Arc::new(Mutex::new(())),
        }
    }

    /// The dedup store
    pub fn store(&self) -> &Arc<dyn NotifiedStore> {
        &self.store
    }

    /// Dispatch notifications for every actionable alert of a pass
    pub async fn dispatch(&self, alerts: &[Alert]) -> DispatchReport {
        self.dispatch_until(alerts, &CancellationToken::new()).await
    }

    /// Like [`dispatch`](Self::dispatch), stopping between alerts once
    /// `token` is cancelled
    pub async fn dispatch_until(
        &self,
        alerts: &[Alert],
        token: &CancellationToken,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        let _serial = self.serial.lock().await;

        for alert in alerts {
            if token.is_cancelled() {
                debug!("Dispatch cancelled");
                break;
            }
            report.record(self.notify_locked(alert).await);
        }

        if report.considered > 0 {
            info!(
                sent = report.sent,
                skipped = report.skipped,
                failed = report.failed,
                "Dispatch finished"
            );
        }

        report
    }

    /// Notify for a single alert, honoring the dedup guard
    pub async fn notify(&self, alert: &Alert) -> DispatchOutcome {
        let _serial = self.serial.lock().await;
        self.notify_locked(alert).await
    }

    async fn notify_locked(&self, alert: &Alert) -> DispatchOutcome {
        if !alert.severity.is_actionable() {
            return DispatchOutcome::NotActionable;
        }

        match self.store.contains(&alert.id).await {
            Ok(true) => return DispatchOutcome::AlreadyNotified,
            Ok(false) => {}
            Err(e) => {
                error!(alert_id = %alert.id, error = %e, "Notified store lookup failed");
                return DispatchOutcome::Failed;
            }
        }

        let payload = NotificationPayload::for_alert(alert, &self.recipients);

        let receipt = match self.channel.send(&payload).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(
                    alert_id = %alert.id,
                    channel = self.channel.name(),
                    error = %e,
                    "Notification send failed"
                );
                return DispatchOutcome::Failed;
            }
        };

        if !receipt.is_success() {
            warn!(
                alert_id = %alert.id,
                status = ?receipt.status,
                "Notification attempted with error status"
            );
        }

        if let Err(e) = self.store.insert(&alert.id).await {
            error!(alert_id = %alert.id, error = %e, "Failed to record notified alert");
            return DispatchOutcome::Failed;
        }

        info!(
            alert_id = %alert.id,
            severity = %alert.severity,
            channel = %receipt.channel,
            "Breach notification sent"
        );
        DispatchOutcome::Sent
    }
}
