//! Feed state held by the monitor

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Alert, TelemetryRecord};

/// Result of one successful synthesis pass
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Normalized records of the fetch
    pub records: Arc<Vec<TelemetryRecord>>,
    /// Alerts synthesized from the records, all severities
    pub alerts: Arc<Vec<Alert>>,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Where the monitor's feed currently stands
#[derive(Debug, Clone, Default)]
pub enum FeedState {
    /// Nothing fetched yet
    #[default]
    Idle,
    /// First fetch (or a retry after a failure) in flight
    Loading,
    /// Latest fetch succeeded
    Ready(Arc<Snapshot>),
    /// Latest fetch failed; waits for a manual refresh or the next poll
    Failed {
        /// Error message
        message: String,
        /// When the fetch failed
        at: DateTime<Utc>,
    },
}

impl FeedState {
    /// Lower-case state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Failed { .. } => "failed",
        }
    }

    /// Snapshot of the latest successful pass, if the feed is ready
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Serializable summary of the monitor
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    /// Feed state name
    pub state: &'static str,
    /// Completion time of the latest successful fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Error of the latest failed fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Records in the current snapshot
    pub records: usize,
    /// Alerts in the current snapshot, all severities
    pub alerts: usize,
    /// Warning or critical alerts in the current snapshot
    pub actionable: usize,
}

impl From<&FeedState> for MonitorStatus {
    fn from(state: &FeedState) -> Self {
        let mut status = Self {
            state: state.name(),
            fetched_at: None,
            error: None,
            records: 0,
            alerts: 0,
            actionable: 0,
        };

        match state {
            FeedState::Ready(snapshot) => {
                status.fetched_at = Some(snapshot.fetched_at);
                status.records = snapshot.records.len();
                status.alerts = snapshot.alerts.len();
                status.actionable = snapshot
                    .alerts
                    .iter()
                    .filter(|a| a.severity.is_actionable())
                    .count();
            }
            FeedState::Failed { message, .. } => status.error = Some(message.clone()),
            FeedState::Idle | FeedState::Loading => {}
        }

        status
    }
}
