//! Alert data models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Alert severity level, ordered `Normal < Warning < Critical`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Reading is comfortably below its threshold
    #[default]
    Normal,
    /// Reading is within the warning band just below its threshold
    Warning,
    /// Reading exceeds its threshold
    Critical,
}

impl Severity {
    /// Upper-case label used in payloads and filters
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }

    /// Whether alerts of this severity are surfaced and notified
    pub fn is_actionable(self) -> bool {
        self >= Self::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Static configuration of one monitored metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredMetric {
    /// Metric column name (e.g. `pressure`)
    pub metric: String,

    /// Display title including the unit
    pub title: String,

    /// Alert threshold
    pub threshold: f64,
}

impl MonitoredMetric {
    /// Create a monitored metric
    pub fn new(metric: impl Into<String>, title: impl Into<String>, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            title: title.into(),
            threshold,
        }
    }

    /// Default monitored metrics and thresholds
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("pressure", "Pressure (psi)", 80.0),
            Self::new("temperature", "Temperature (°C)", 60.0),
            Self::new("flow_rate", "Flow Rate (m³/h)", 1000.0),
            Self::new("energy_consumption", "Energy Consumption (kWh)", 40.0),
        ]
    }
}

/// Alert identity, derived from the segment and metric it describes
///
/// Identities are stable across feed fetches, so they double as the key of the
/// "already notified" store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(String);

impl AlertId {
    /// Identity of the alert for a (segment, metric) pair
    pub fn for_pair(segment_id: &str, metric: &str) -> Self {
        Self(format!("{segment_id}:{metric}"))
    }

    /// String form of the identity
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A classified threshold alert for one (segment, metric) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Identity, unique per synthesis pass and stable across passes
    pub id: AlertId,

    /// Segment the readings belong to
    pub segment_id: String,

    /// Metric column name
    pub metric: String,

    /// Human-readable title
    pub title: String,

    /// Second-latest reading (equal to the current one if only one exists)
    pub previous_value: f64,

    /// Latest reading
    pub current_value: f64,

    /// Threshold the reading was classified against
    pub threshold: f64,

    /// Severity, a pure function of `current_value` and `threshold`
    pub severity: Severity,

    /// Time of the latest reading
    pub timestamp: String,
}

impl Alert {
    /// Absolute distance between the latest reading and the threshold
    pub fn threshold_gap(&self) -> f64 {
        (self.current_value - self.threshold).abs()
    }
}

/// Status filter applied to synthesized alerts before display
///
/// `All` means warning or critical; normal alerts are never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusFilter {
    /// Warning and critical alerts
    #[default]
    All,
    /// Critical alerts only
    Critical,
    /// Warning alerts only
    Warning,
}

impl StatusFilter {
    /// Whether an alert of the given severity passes the filter
    pub fn matches(self, severity: Severity) -> bool {
        match self {
            Self::All => severity.is_actionable(),
            Self::Critical => severity == Severity::Critical,
            Self::Warning => severity == Severity::Warning,
        }
    }

    /// Select the alerts passing the filter, preserving order
    pub fn apply<'a>(self, alerts: &'a [Alert]) -> Vec<&'a Alert> {
        alerts.iter().filter(|a| self.matches(a.severity)).collect()
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "CRITICAL" => Ok(Self::Critical),
            "WARNING" => Ok(Self::Warning),
            other => Err(Error::validation(format!("unknown status filter: {other}"))),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Critical => f.write_str("CRITICAL"),
            Self::Warning => f.write_str("WARNING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(segment: &str, severity: Severity) -> Alert {
        Alert {
            id: AlertId::for_pair(segment, "pressure"),
            segment_id: segment.to_string(),
            metric: "pressure".to_string(),
            title: format!("{segment} - Pressure (psi)"),
            previous_value: 70.0,
            current_value: 75.0,
            threshold: 80.0,
            severity,
            timestamp: "2025-03-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Normal < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
        assert!(!Severity::Normal.is_actionable());
        assert!(Severity::Warning.is_actionable());
    }

    #[test]
    fn test_all_filter_excludes_normal() {
        let alerts = vec![
            alert("A", Severity::Normal),
            alert("B", Severity::Warning),
            alert("C", Severity::Critical),
        ];

        let shown: Vec<&str> = StatusFilter::All
            .apply(&alerts)
            .into_iter()
            .map(|a| a.segment_id.as_str())
            .collect();

        assert_eq!(shown, vec!["B", "C"]);
    }

    #[test]
    fn test_single_severity_filters() {
        let alerts = vec![
            alert("A", Severity::Critical),
            alert("B", Severity::Warning),
            alert("C", Severity::Critical),
        ];

        assert_eq!(StatusFilter::Critical.apply(&alerts).len(), 2);
        assert_eq!(StatusFilter::Warning.apply(&alerts).len(), 1);
    }

    #[test]
    fn test_threshold_gap_either_side() {
        let below = alert("A", Severity::Warning);
        let mut above = alert("B", Severity::Critical);
        above.current_value = 85.5;

        assert_eq!(below.threshold_gap(), 5.0);
        assert_eq!(above.threshold_gap(), 5.5);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(" Critical ".parse::<StatusFilter>().unwrap(), StatusFilter::Critical);
        assert!("NORMAL".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_alert_id_is_stable() {
        assert_eq!(
            AlertId::for_pair("SEG-1", "pressure"),
            AlertId::for_pair("SEG-1", "pressure")
        );
        assert_eq!(AlertId::for_pair("SEG-1", "pressure").as_str(), "SEG-1:pressure");
    }

    #[test]
    fn test_severity_serializes_upper_case() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
