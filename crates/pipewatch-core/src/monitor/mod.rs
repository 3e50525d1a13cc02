//! Monitor session
//!
//! Runs synthesis passes: fetch the feed, normalize, synthesize alerts, publish
//! the snapshot, then hand the alerts to the dispatcher as a separate task.
//! Passes never overlap. Cancelling the monitor abandons an in-flight fetch and
//! any result it would have produced.

mod state;

pub use state::{FeedState, MonitorStatus, Snapshot};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::alerting::{
    AlertEvaluator, DispatchReport, HttpNotificationChannel, InMemoryNotifiedStore,
    LogNotificationChannel, NotificationChannel, NotificationDispatcher, NotifiedStore,
};
use crate::config::{Config, DedupBackend};
use crate::db::{RedisNotifiedStore, RedisPool};
use crate::error::{Error, Result};
use crate::feed::FeedClient;

/// Outcome of a successful pass
pub struct PassHandle {
    /// The published snapshot
    pub snapshot: Arc<Snapshot>,
    /// Dispatch task issued for the pass, when notifications are enabled
    pub dispatch: Option<JoinHandle<DispatchReport>>,
}

/// Owns the feed state and drives synthesis passes
pub struct Monitor {
    feed: FeedClient,
    evaluator: AlertEvaluator,
    dispatcher: Option<NotificationDispatcher>,
    state: RwLock<FeedState>,
    pass_lock: Mutex<()>,
    token: CancellationToken,
    tasks: TaskTracker,
}

impl Monitor {
    /// Create a monitor; `dispatcher` is `None` when notifications are off
    pub fn new(
        feed: FeedClient,
        evaluator: AlertEvaluator,
        dispatcher: Option<NotificationDispatcher>,
    ) -> Self {
        Self {
            feed,
            evaluator,
            dispatcher,
            state: RwLock::new(FeedState::Idle),
            pass_lock: Mutex::new(()),
            token: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Build a monitor and its collaborators from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let feed = FeedClient::new(&config.feed)?;
        let evaluator = AlertEvaluator::new(config.alerting.metrics.clone());

        let dispatcher = if config.notification.enabled {
            let store = build_store(config).await?;
            let channel: Arc<dyn NotificationChannel> = if config.notification.dry_run {
                Arc::new(LogNotificationChannel)
            } else {
                Arc::new(
                    HttpNotificationChannel::new(config.notification.url.clone())
                        .map_err(|e| Error::config(e.to_string()))?,
                )
            };
            Some(NotificationDispatcher::new(
                store,
                channel,
                config.notification.recipients.clone(),
            ))
        } else {
            info!("Notifications disabled");
            None
        };

        Ok(Self::new(feed, evaluator, dispatcher))
    }

    /// Current feed state
    pub fn state(&self) -> FeedState {
        self.state.read().clone()
    }

    /// Snapshot of the latest successful pass, if the feed is ready
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.read().snapshot().cloned()
    }

    /// Summary of the current state
    pub fn status(&self) -> MonitorStatus {
        MonitorStatus::from(&*self.state.read())
    }

    /// The notification dispatcher, if notifications are enabled
    pub fn dispatcher(&self) -> Option<&NotificationDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Token cancelled when the monitor shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run one synthesis pass
    ///
    /// On a fetch error the state becomes [`FeedState::Failed`] and no alerts
    /// are synthesized. A fetch that completes after shutdown is discarded.
    pub async fn refresh(&self) -> Result<PassHandle> {
        let _pass = self.pass_lock.lock().await;
        if self.token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        {
            let mut state = self.state.write();
            if !matches!(*state, FeedState::Ready(_)) {
                *state = FeedState::Loading;
            }
        }

        let fetched = tokio::select! {
            () = self.token.cancelled() => {
                debug!("Fetch abandoned on shutdown");
                return Err(Error::Cancelled);
            }
            result = self.feed.fetch() => result,
        };

        if self.token.is_cancelled() {
            debug!("Discarding fetch completed after shutdown");
            return Err(Error::Cancelled);
        }

        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                warn!(url = %self.feed.url(), error = %e, "Feed fetch failed");
                *self.state.write() = FeedState::Failed {
                    message: e.to_string(),
                    at: Utc::now(),
                };
                return Err(e);
            }
        };

        let fetched_at = Utc::now();
        let alerts = self.evaluator.evaluate(&records, fetched_at);
        let snapshot = Arc::new(Snapshot {
            records: Arc::new(records),
            alerts: Arc::new(alerts),
            fetched_at,
        });

        *self.state.write() = FeedState::Ready(snapshot.clone());

        info!(
            records = snapshot.records.len(),
            alerts = snapshot.alerts.len(),
            "Synthesis pass complete"
        );

        let dispatch = self.dispatcher.clone().map(|dispatcher| {
            let alerts = snapshot.alerts.clone();
            let token = self.token.clone();
            self.tasks
                .spawn(async move { dispatcher.dispatch_until(&alerts, &token).await })
        });

        Ok(PassHandle { snapshot, dispatch })
    }

    /// Fetch once, then poll every `poll_interval` until shutdown
    ///
    /// Without an interval the monitor only refreshes on demand after the
    /// first pass.
    pub async fn run(&self, poll_interval: Option<Duration>) {
        self.refresh_logged().await;

        let Some(period) = poll_interval else {
            self.token.cancelled().await;
            return;
        };

        info!(interval = %humantime::format_duration(period), "Polling feed");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.token.cancelled() => break,
                _ = ticker.tick() => self.refresh_logged().await,
            }
        }
    }

    /// Cancel in-flight work and wait for dispatch tasks to wind down
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("Monitor stopped");
    }

    async fn refresh_logged(&self) {
        match self.refresh().await {
            Ok(_) | Err(Error::Cancelled) => {}
            Err(e) => error!(error = %e, "Synthesis pass failed"),
        }
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn NotifiedStore>> {
    match config.dedup.backend {
        DedupBackend::Memory => Ok(Arc::new(InMemoryNotifiedStore::new())),
        DedupBackend::Redis => {
            let pool = RedisPool::new(&config.redis)?;
            pool.health_check().await?;
            info!(key = %config.dedup.key, "Using Redis notified store");
            Ok(Arc::new(RedisNotifiedStore::new(
                &pool,
                config.dedup.key.clone(),
                config.dedup.ttl,
            )))
        }
    }
}
