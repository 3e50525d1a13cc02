//! Alerting system for Pipewatch
//!
//! Classifies the latest reading of every monitored metric against its
//! threshold, synthesizes alerts, and sends one notification per alert
//! identity.

mod classifier;
mod dedup;
mod dispatcher;
mod evaluator;
mod notifier;

pub use classifier::{classify, WARNING_RATIO};
pub use dedup::{InMemoryNotifiedStore, NotifiedStore};
pub use dispatcher::{DispatchOutcome, DispatchReport, NotificationDispatcher};
pub use evaluator::{group_by_segment, latest_pair, AlertEvaluator, MetricPair, SegmentGroup};
pub use notifier::{
    DeliveryReceipt, HttpNotificationChannel, LogNotificationChannel, NotificationChannel,
    NotificationError, NotificationPayload,
};
