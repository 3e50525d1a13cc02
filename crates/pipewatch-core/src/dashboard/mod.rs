//! Dashboard views over a feed snapshot
//!
//! KPI tiles for one device and chart series with band classification. These
//! are read-only projections of the records the monitor already holds.

mod series;
mod snapshot;

pub use series::{band_status, device_series, MetricSeries, SeriesPoint};
pub use snapshot::{kpi_status, DeviceSnapshot, KpiDirection, KpiTile, SnapshotQuery};

use std::collections::HashSet;

use crate::models::TelemetryRecord;

/// Distinct device ids in feed order
pub fn device_ids(records: &[TelemetryRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.segment_id.as_str())
        .filter(|id| seen.insert(*id))
        .map(String::from)
        .collect()
}

/// Records belonging to one device, in feed order
pub fn device_records<'a>(
    records: &'a [TelemetryRecord],
    device_id: &'a str,
) -> impl Iterator<Item = &'a TelemetryRecord> + 'a {
    records.iter().filter(move |r| r.segment_id == device_id)
}
