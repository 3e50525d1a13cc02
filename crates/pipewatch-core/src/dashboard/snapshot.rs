//! KPI snapshot of one device

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::KpiThresholds;
use crate::models::{Severity, TelemetryRecord};

use super::device_records;

/// Which side of the threshold is bad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiDirection {
    /// Values at or above the threshold are bad
    High,
    /// Values at or below the threshold are bad
    Low,
}

/// Tile status for a KPI value
///
/// High: `>= 1.1 t` critical, `>= t` warning. Low: `<= 0.5 t` critical,
/// `<= t` warning.
pub fn kpi_status(value: f64, threshold: f64, direction: KpiDirection) -> Severity {
    match direction {
        KpiDirection::High if value >= threshold * 1.1 => Severity::Critical,
        KpiDirection::High if value >= threshold => Severity::Warning,
        KpiDirection::Low if value <= threshold * 0.5 => Severity::Critical,
        KpiDirection::Low if value <= threshold => Severity::Warning,
        _ => Severity::Normal,
    }
}

/// One KPI tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiTile {
    /// Display value
    pub value: String,
    /// Unit, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    /// Tile status
    pub status: Severity,
}

impl KpiTile {
    fn measured(value: f64, unit: &'static str, threshold: f64) -> Self {
        Self {
            value: format!("{value:.2}"),
            unit: Some(unit),
            status: kpi_status(value, threshold, KpiDirection::High),
        }
    }
}

/// Filters selecting which reading a snapshot shows
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    /// Only readings on this UTC date
    pub date: Option<NaiveDate>,
    /// Prefer the reading at this `HH:MM`
    pub time: Option<String>,
}

/// KPI tiles for one device's selected reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Device (segment) id
    pub device_id: String,
    /// Asset id of the reading
    pub asset_id: String,
    /// Reading timestamp
    pub timestamp: Option<String>,
    /// Pressure tile
    pub pressure: KpiTile,
    /// Flow rate tile
    pub flow_rate: KpiTile,
    /// Temperature tile
    pub temperature: KpiTile,
    /// Energy consumption tile
    pub energy_consumption: KpiTile,
    /// Valve status tile
    pub valve_status: KpiTile,
    /// Alarms triggered tile
    pub alarms_triggered: KpiTile,
    /// Overall predicted condition from pressure and temperature
    pub predicted_condition: Severity,
}

impl DeviceSnapshot {
    /// Build the snapshot for `device_id`
    ///
    /// Returns `None` when no reading of the device matches the query.
    pub fn build(
        records: &[TelemetryRecord],
        device_id: &str,
        query: &SnapshotQuery,
        thresholds: &KpiThresholds,
    ) -> Option<Self> {
        let candidates: Vec<&TelemetryRecord> = device_records(records, device_id)
            .filter(|r| query.date.map_or(true, |date| date_part(r) == Some(date)))
            .collect();

        let reading = query
            .time
            .as_deref()
            .and_then(|time| {
                let wanted = time.get(..5).unwrap_or(time);
                candidates
                    .iter()
                    .find(|r| time_part(r) == Some(wanted))
                    .copied()
            })
            .or_else(|| latest(&candidates))?;

        Some(Self::from_reading(device_id, reading, thresholds))
    }

    fn from_reading(device_id: &str, reading: &TelemetryRecord, t: &KpiThresholds) -> Self {
        let value = |metric: &str| reading.metric(metric).unwrap_or(0.0);
        let pressure = value("pressure");
        let temperature = value("temperature");

        let valve = if reading.valve_status.is_empty() {
            "UNKNOWN".to_string()
        } else {
            reading.valve_status.clone()
        };
        let valve_status = if valve.eq_ignore_ascii_case("OPEN") {
            Severity::Normal
        } else {
            Severity::Warning
        };

        let alarms = if reading.alarm_active() { 1.0 } else { 0.0 };

        Self {
            device_id: device_id.to_string(),
            asset_id: reading.asset_id.clone(),
            timestamp: reading.timestamp.clone(),
            pressure: KpiTile::measured(pressure, "psi", t.pressure),
            flow_rate: KpiTile::measured(value("flow_rate"), "m³/h", t.flow_rate),
            temperature: KpiTile::measured(temperature, "°C", t.temperature),
            energy_consumption: KpiTile::measured(
                value("energy_consumption"),
                "kWh",
                t.energy_consumption,
            ),
            valve_status: KpiTile {
                value: valve,
                unit: None,
                status: valve_status,
            },
            alarms_triggered: KpiTile {
                value: format!("{alarms:.0}"),
                unit: None,
                status: kpi_status(alarms, t.alarms, KpiDirection::High),
            },
            predicted_condition: predicted_condition(pressure, temperature, t),
        }
    }
}

fn predicted_condition(pressure: f64, temperature: f64, t: &KpiThresholds) -> Severity {
    if pressure > t.pressure * 1.1 || temperature > t.temperature * 1.1 {
        Severity::Critical
    } else if pressure > t.pressure * 0.95 || temperature > t.temperature * 0.95 {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Latest reading by timestamp string; ties keep the earlier record
fn latest<'a>(records: &[&'a TelemetryRecord]) -> Option<&'a TelemetryRecord> {
    records.iter().copied().reduce(|best, candidate| {
        if candidate.timestamp > best.timestamp {
            candidate
        } else {
            best
        }
    })
}

fn date_part(record: &TelemetryRecord) -> Option<NaiveDate> {
    let ts = record.timestamp.as_deref()?;
    NaiveDate::parse_from_str(ts.get(..10)?, "%Y-%m-%d").ok()
}

fn time_part(record: &TelemetryRecord) -> Option<&str> {
    let ts = record.timestamp.as_deref()?;
    let (_, time) = ts.split_once(['T', ' '])?;
    time.get(..5)
}
