//! # Pipewatch
//!
//! Threshold alerting for pipe and asset telemetry.
//!
//! Pipewatch polls a telemetry feed, normalizes its rows into typed records,
//! compares each segment's latest reading of every monitored metric against its
//! threshold, and sends one email notification per breaching
//! `(segment, metric)` pair.
//!
//! ## Architecture
//!
//! - **Feed**: HTTP client and row normalizer for the column-array feed
//! - **Alerting**: Severity classification, alert synthesis and deduplicated dispatch
//! - **Monitor**: Fetch state machine and polling loop
//! - **Dashboard**: KPI tiles and chart series for one device
//! - **API**: REST API over the monitor
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the monitor and its API
//! pipewatch serve
//!
//! # One pass, printing alerts without sending anything
//! pipewatch check --dry-run
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod monitor;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertEvaluator, NotificationDispatcher, NotifiedStore};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::feed::FeedClient;
    pub use crate::models::*;
    pub use crate::monitor::{FeedState, Monitor};
}
