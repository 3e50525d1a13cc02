//! Configuration management for Pipewatch
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `PIPEWATCH__SECTION__KEY` environment variables. Every section defaults
//! field by field, so a file only needs the keys it changes. Lists replace
//! their default wholesale.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::models::MonitoredMetric;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API configuration
    pub server: ServerConfig,

    /// Telemetry feed configuration
    pub feed: FeedConfig,

    /// Alert evaluation configuration
    pub alerting: AlertingConfig,

    /// Notification delivery configuration
    pub notification: NotificationConfig,

    /// Notification dedup store configuration
    pub dedup: DedupConfig,

    /// Redis configuration
    pub redis: RedisConfig,

    /// Dashboard view configuration
    pub dashboard: DashboardConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Environment variable prefix
    pub const ENV_PREFIX: &'static str = "PIPEWATCH";

    /// Load configuration from defaults, an optional file and the environment
    ///
    /// When `path` is `None` the per-user config file is read if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    /// Environment source: `PIPEWATCH__SECTION__KEY`, with comma-separated
    /// lists for recipients
    pub fn environment() -> config::Environment {
        config::Environment::with_prefix(Self::ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("notification.recipients")
    }

    /// Like [`load`](Self::load) with an explicit environment source
    pub fn load_with(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Reading config file");
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(path) = default_config_path() {
                    debug!(path = %path.display(), "Looking for default config file");
                    builder = builder.add_source(config::File::from(path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(env)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        validate_http_url("feed.url", &self.feed.url)?;

        if self.notification.enabled {
            validate_http_url("notification.url", &self.notification.url)?;

            if self.notification.recipients.is_empty() {
                return Err(Error::config("notification.recipients must not be empty"));
            }

            let mut seen = HashSet::new();
            for recipient in &self.notification.recipients {
                if !EMAIL_RE.is_match(recipient) {
                    return Err(Error::config(format!(
                        "notification.recipients: invalid email address '{recipient}'"
                    )));
                }
                if !seen.insert(recipient.to_ascii_lowercase()) {
                    return Err(Error::config(format!(
                        "notification.recipients: duplicate address '{recipient}'"
                    )));
                }
            }
        }

        if self.alerting.metrics.is_empty() {
            return Err(Error::config("alerting.metrics must not be empty"));
        }

        let mut names = HashSet::new();
        for metric in &self.alerting.metrics {
            if !metric.threshold.is_finite() || metric.threshold <= 0.0 {
                return Err(Error::config(format!(
                    "alerting.metrics: threshold for '{}' must be a positive number",
                    metric.metric
                )));
            }
            if !names.insert(metric.metric.as_str()) {
                return Err(Error::config(format!(
                    "alerting.metrics: '{}' is listed twice",
                    metric.metric
                )));
            }
        }

        for band in &self.dashboard.bands {
            if !(band.lower.is_finite() && band.upper.is_finite() && band.lower < band.upper) {
                return Err(Error::config(format!(
                    "dashboard.bands: '{}' needs lower < upper",
                    band.metric
                )));
            }
        }

        if self.dedup.backend == DedupBackend::Redis {
            validate_url("redis.url", &self.redis.url)?;
        }

        Ok(())
    }
}

/// Per-user config file location (`<config dir>/pipewatch/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "pipewatch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn validate_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("{field}: invalid URL '{raw}': {e}")))
}

fn validate_http_url(field: &str, raw: &str) -> Result<()> {
    let url = validate_url(field, raw)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config(format!(
            "{field}: unsupported scheme '{other}'"
        ))),
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Telemetry feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed endpoint
    pub url: String,
    /// Polling interval; when unset the feed is fetched once and then only on
    /// manual refresh
    #[serde(with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7071/api/GetDatabricksData".to_string(),
            poll_interval: None,
        }
    }
}

/// Alert evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Metrics evaluated for every segment, in evaluation order
    pub metrics: Vec<MonitoredMetric>,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            metrics: MonitoredMetric::defaults(),
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Whether breach notifications are dispatched at all
    pub enabled: bool,
    /// Email relay endpoint
    pub url: String,
    /// Fixed recipient list
    pub recipients: Vec<String>,
    /// Log notifications instead of sending them
    pub dry_run: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:3000/api/send-email".to_string(),
            recipients: vec!["operations@example.com".to_string()],
            dry_run: false,
        }
    }
}

/// Where "already notified" alert identities are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupBackend {
    /// Process memory; cleared on restart
    #[default]
    Memory,
    /// Redis set; survives restarts
    Redis,
}

/// Notification dedup store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Store backend
    pub backend: DedupBackend,
    /// Redis key holding the notified set
    pub key: String,
    /// Expiry applied to the Redis set after each insert
    #[serde(with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            backend: DedupBackend::Memory,
            key: "pipewatch:notified".to_string(),
            ttl: None,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis URL
    pub url: String,
    /// Maximum connections
    pub max_connections: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            max_connections: 4,
        }
    }
}

/// KPI tile thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiThresholds {
    /// Pressure (psi)
    pub pressure: f64,
    /// Temperature (°C)
    pub temperature: f64,
    /// Energy consumption (kWh)
    pub energy_consumption: f64,
    /// Flow rate (m³/h)
    pub flow_rate: f64,
    /// Alarms triggered
    pub alarms: f64,
}

impl Default for KpiThresholds {
    fn default() -> Self {
        Self {
            pressure: 80.0,
            temperature: 60.0,
            energy_consumption: 40.0,
            flow_rate: 1000.0,
            alarms: 50.0,
        }
    }
}

/// Operating band of a charted metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBand {
    /// Metric column name
    pub metric: String,
    /// Lower limit
    pub lower: f64,
    /// Upper limit
    pub upper: f64,
}

impl MetricBand {
    /// Create a band
    pub fn new(metric: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            metric: metric.into(),
            lower,
            upper,
        }
    }
}

/// Dashboard view configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// KPI tile thresholds
    pub kpi: KpiThresholds,
    /// Chart operating bands
    pub bands: Vec<MetricBand>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            kpi: KpiThresholds::default(),
            bands: vec![
                MetricBand::new("pressure", 40.06, 80.65),
                MetricBand::new("temperature", 30.0, 100.0),
                MetricBand::new("flow_rate", 400.0, 670.0),
                MetricBand::new("pump_speed", 1100.0, 2600.99),
                MetricBand::new("energy_consumption", 17.0, 33.0),
            ],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
