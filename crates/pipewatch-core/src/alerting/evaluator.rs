//! Alert synthesis
//!
//! Groups a feed snapshot by segment, extracts the latest and second-latest
//! reading of every monitored metric, and builds one classified alert per
//! (segment, metric) pair.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::models::{Alert, AlertId, MonitoredMetric, Severity, TelemetryRecord};

/// Records of one segment, in feed order
#[derive(Debug, Clone)]
pub struct SegmentGroup<'a> {
    /// Segment identifier
    pub segment_id: &'a str,
    /// The segment's records, in feed order
    pub records: Vec<&'a TelemetryRecord>,
}

/// Latest two observations of one metric
#[derive(Debug, Clone, Copy)]
pub struct MetricPair<'a> {
    /// Second-to-last observation, or the last one if it is the only one
    pub previous: f64,
    /// Last observation
    pub current: f64,
    /// Record carrying the last observation
    pub record: &'a TelemetryRecord,
}

/// Partition records by segment
///
/// Segments appear in the order they are first seen; records keep feed order,
/// which is taken as chronological. Nothing is sorted here.
pub fn group_by_segment(records: &[TelemetryRecord]) -> Vec<SegmentGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<SegmentGroup<'_>> = Vec::new();

    for record in records {
        let segment_id = record.segment_id.as_str();
        let slot = *index.entry(segment_id).or_insert_with(|| {
            groups.push(SegmentGroup {
                segment_id,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record);
    }

    groups
}

/// Latest and second-latest value of `metric` among `records`
///
/// Returns `None` when no record carries the metric.
pub fn latest_pair<'a>(records: &[&'a TelemetryRecord], metric: &str) -> Option<MetricPair<'a>> {
    let mut observed = records
        .iter()
        .rev()
        .filter_map(|r| r.metric(metric).map(|value| (value, *r)));

    let (current, record) = observed.next()?;
    let previous = observed.next().map_or(current, |(value, _)| value);

    Some(MetricPair {
        previous,
        current,
        record,
    })
}

/// Builds classified alerts from a feed snapshot
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    metrics: Vec<MonitoredMetric>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(MonitoredMetric::defaults())
    }
}

impl AlertEvaluator {
    /// Create an evaluator for the given monitored metrics
    pub fn new(metrics: Vec<MonitoredMetric>) -> Self {
        Self { metrics }
    }

    /// Monitored metrics, in evaluation order
    pub fn metrics(&self) -> &[MonitoredMetric] {
        &self.metrics
    }

    /// Run one synthesis pass
    ///
    /// `now` stamps alerts whose record has no timestamp. Output order is
    /// segment first-seen order, then monitored-metric order.
    pub fn evaluate(&self, records: &[TelemetryRecord], now: DateTime<Utc>) -> Vec<Alert> {
        let groups = group_by_segment(records);
        let mut alerts = Vec::with_capacity(groups.len() * self.metrics.len());

        for group in &groups {
            for spec in &self.metrics {
                let Some(pair) = latest_pair(&group.records, &spec.metric) else {
                    continue;
                };
                alerts.push(self.build_alert(group.segment_id, spec, &pair, now));
            }
        }

        debug!(
            records = records.len(),
            segments = groups.len(),
            alerts = alerts.len(),
            "Synthesized alerts"
        );

        alerts
    }

    fn build_alert(
        &self,
        segment_id: &str,
        spec: &MonitoredMetric,
        pair: &MetricPair<'_>,
        now: DateTime<Utc>,
    ) -> Alert {
        let timestamp = pair
            .record
            .timestamp
            .clone()
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));

        Alert {
            id: AlertId::for_pair(segment_id, &spec.metric),
            segment_id: segment_id.to_string(),
            metric: spec.metric.clone(),
            title: format!("{segment_id} - {}", spec.title),
            previous_value: pair.previous,
            current_value: pair.current,
            threshold: spec.threshold,
            severity: Severity::classify(pair.current, spec.threshold),
            timestamp,
        }
    }
}
