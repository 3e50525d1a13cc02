//! Chart series with band classification

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MetricBand;
use crate::models::{Severity, TelemetryRecord};

use super::device_records;

/// Share of the band edge that counts as "near" it
const NEAR_EDGE: f64 = 0.05;

/// Classify a value against an operating band
///
/// Outside the band is critical; within 5% inside either edge is a warning.
pub fn band_status(value: f64, band: &MetricBand) -> Severity {
    if value > band.upper || value < band.lower {
        Severity::Critical
    } else if value > band.upper * (1.0 - NEAR_EDGE) || value < band.lower * (1.0 + NEAR_EDGE) {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// One chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Reading time
    pub timestamp: DateTime<Utc>,
    /// Rounded value
    pub value: f64,
}

/// A charted metric for one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    /// Metric column name
    pub metric: String,
    /// Lower band limit
    pub lower: f64,
    /// Upper band limit
    pub upper: f64,
    /// Points in feed order
    pub points: Vec<SeriesPoint>,
    /// Status of the last point; normal when there are no points
    pub status: Severity,
}

/// Series for every banded metric of a device
///
/// Readings whose timestamp does not parse are left out.
pub fn device_series(
    records: &[TelemetryRecord],
    device_id: &str,
    bands: &[MetricBand],
) -> Vec<MetricSeries> {
    let readings: Vec<(DateTime<Utc>, &TelemetryRecord)> = device_records(records, device_id)
        .filter_map(|r| r.parsed_timestamp().map(|ts| (ts, r)))
        .collect();

    bands
        .iter()
        .map(|band| {
            let points: Vec<SeriesPoint> = readings
                .iter()
                .map(|(timestamp, r)| SeriesPoint {
                    timestamp: *timestamp,
                    value: round_for(&band.metric, r.metric(&band.metric).unwrap_or(0.0)),
                })
                .collect();

            let status = points
                .last()
                .map_or(Severity::Normal, |p| band_status(p.value, band));

            MetricSeries {
                metric: band.metric.clone(),
                lower: band.lower,
                upper: band.upper,
                points,
                status,
            }
        })
        .collect()
}

/// Energy keeps one decimal, everything else is charted as integers
fn round_for(metric: &str, value: f64) -> f64 {
    if metric == "energy_consumption" {
        (value * 10.0).round() / 10.0
    } else {
        value.round()
    }
}
