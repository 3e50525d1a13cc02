//! Telemetry data models

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Positional column schema of the analytics feed's `data_array` rows
pub const FEED_COLUMNS: [&str; 14] = [
    "AssetId",
    "_ingest_ts",
    "_record_id",
    "alarm_triggered",
    "compressor_state",
    "energy_consumption",
    "flow_rate",
    "pressure",
    "pump_speed",
    "pump_state",
    "segment_id",
    "temperature",
    "timestamp",
    "valve_status",
];

/// Feed columns coerced to numbers during normalization
pub const NUMERIC_COLUMNS: [&str; 5] = [
    "energy_consumption",
    "flow_rate",
    "pressure",
    "pump_speed",
    "temperature",
];

/// Segment id used when a row carries neither a segment nor an asset id
pub const UNKNOWN_SEGMENT: &str = "unknown";

/// A single normalized cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric column, always finite
    Number(f64),
    /// Any other column
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a numeric cell
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is a text cell
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

/// A keyed row produced by the feed normalizer
///
/// Columns missing from a short row are absent keys rather than empty values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) {
        self.fields.insert(column.into(), value);
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// Get a numeric column value
    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(FieldValue::as_number)
    }

    /// Get a text column value
    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(FieldValue::as_text)
    }

    /// Number of columns present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no column is present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One observation for one asset/segment at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Asset identifier
    pub asset_id: String,

    /// Segment identifier, falling back to the asset id and then to `"unknown"`
    pub segment_id: String,

    /// Observation time, falling back to the ingestion timestamp
    pub timestamp: Option<String>,

    /// Ingestion timestamp
    pub ingest_ts: Option<String>,

    /// Upstream record identifier
    pub record_id: Option<String>,

    /// Numeric metrics present in the row
    pub metrics: BTreeMap<String, f64>,

    /// Valve status (e.g. `OPEN`, `CLOSED`)
    pub valve_status: String,

    /// Pump state
    pub pump_state: String,

    /// Compressor state
    pub compressor_state: String,

    /// Alarm flag as delivered by the feed (`"true"` / `"false"`)
    pub alarm_triggered: String,
}

impl TelemetryRecord {
    /// Value of a numeric metric, if the row carried it
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Whether the alarm flag is set
    pub fn alarm_active(&self) -> bool {
        self.alarm_triggered.eq_ignore_ascii_case("true")
    }

    /// Observation time parsed as UTC
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_timestamp)
    }
}

impl From<&Record> for TelemetryRecord {
    fn from(record: &Record) -> Self {
        let text = |column: &str| {
            record
                .text(column)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let asset_id = text("AssetId").unwrap_or_default();
        let segment_id = text("segment_id")
            .or_else(|| text("AssetId"))
            .unwrap_or_else(|| UNKNOWN_SEGMENT.to_string());
        let ingest_ts = text("_ingest_ts");
        let timestamp = text("timestamp").or_else(|| ingest_ts.clone());

        let metrics = NUMERIC_COLUMNS
            .iter()
            .filter_map(|column| record.number(column).map(|v| ((*column).to_string(), v)))
            .collect();

        Self {
            asset_id,
            segment_id,
            timestamp,
            ingest_ts,
            record_id: text("_record_id"),
            metrics,
            valve_status: text("valve_status").unwrap_or_default(),
            pump_state: text("pump_state").unwrap_or_default(),
            compressor_state: text("compressor_state").unwrap_or_default(),
            alarm_triggered: text("alarm_triggered").unwrap_or_default(),
        }
    }
}

/// Parse a feed timestamp as UTC
///
/// Accepts RFC 3339 and naive `YYYY-MM-DD[T ]HH:MM:SS[.fff]` forms, the latter
/// read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        let mut record = Record::new();
        for (column, value) in pairs {
            record.insert(*column, value.clone());
        }
        record
    }

    #[test]
    fn test_segment_falls_back_to_asset() {
        let r = record(&[
            ("AssetId", FieldValue::Text("PUMP-7".into())),
            ("segment_id", FieldValue::Text(String::new())),
        ]);
        let telemetry = TelemetryRecord::from(&r);
        assert_eq!(telemetry.segment_id, "PUMP-7");
        assert_eq!(telemetry.asset_id, "PUMP-7");
    }

    #[test]
    fn test_segment_falls_back_to_unknown() {
        let telemetry = TelemetryRecord::from(&Record::new());
        assert_eq!(telemetry.segment_id, UNKNOWN_SEGMENT);
        assert!(telemetry.metrics.is_empty());
        assert!(telemetry.timestamp.is_none());
    }

    #[test]
    fn test_timestamp_falls_back_to_ingest_time() {
        let r = record(&[
            ("_ingest_ts", FieldValue::Text("2025-03-01T10:00:00Z".into())),
            ("timestamp", FieldValue::Text(String::new())),
        ]);
        let telemetry = TelemetryRecord::from(&r);
        assert_eq!(telemetry.timestamp.as_deref(), Some("2025-03-01T10:00:00Z"));
    }

    #[test]
    fn test_only_present_metrics_are_kept() {
        let r = record(&[
            ("pressure", FieldValue::Number(71.5)),
            ("temperature", FieldValue::Number(0.0)),
        ]);
        let telemetry = TelemetryRecord::from(&r);
        assert_eq!(telemetry.metric("pressure"), Some(71.5));
        assert_eq!(telemetry.metric("temperature"), Some(0.0));
        assert_eq!(telemetry.metric("flow_rate"), None);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2025-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2025-03-01T10:00:00.250+02:00").is_some());
        assert!(parse_timestamp("2025-03-01 10:00:00").is_some());
        assert!(parse_timestamp("2025-03-01T10:00:00.123").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
