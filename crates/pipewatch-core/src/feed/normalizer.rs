//! Positional row normalizer
//!
//! Converts array-of-arrays payloads into keyed records. Malformed input is
//! tolerated by coercion and never raised as an error.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::{FieldValue, Record, FEED_COLUMNS, NUMERIC_COLUMNS};

/// Maps positional rows onto a fixed column schema
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: Vec<String>,
    numeric: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::telemetry()
    }
}

impl Normalizer {
    /// Create a normalizer for the given column order and numeric column set
    pub fn new<C, N>(columns: C, numeric: N) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            numeric: numeric.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalizer for the analytics feed schema
    pub fn telemetry() -> Self {
        Self::new(FEED_COLUMNS, NUMERIC_COLUMNS)
    }

    /// Column names in positional order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Normalize a sequence of rows, one record per row
    pub fn normalize(&self, rows: &[Value]) -> Vec<Record> {
        rows.iter().map(|row| self.normalize_row(row)).collect()
    }

    /// Normalize one row
    ///
    /// Columns beyond the row's length stay absent; extra trailing values are
    /// ignored. A row that is not an array yields an empty record.
    pub fn normalize_row(&self, row: &Value) -> Record {
        let cells: &[Value] = row.as_array().map_or(&[], Vec::as_slice);
        let mut record = Record::new();

        for (column, cell) in self.columns.iter().zip(cells) {
            let value = if self.numeric.contains(column) {
                FieldValue::Number(coerce_number(cell))
            } else {
                FieldValue::Text(coerce_text(cell))
            };
            record.insert(column.clone(), value);
        }

        record
    }
}

/// Coerce a cell to a finite number; anything unusable becomes `0`
fn coerce_number(cell: &Value) -> f64 {
    let parsed = match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.replace(',', "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                Some(0.0)
            } else {
                cleaned.parse::<f64>().ok()
            }
        }
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Render a cell as text; `null` becomes the empty string
fn coerce_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_coercion_example() {
        let normalizer = Normalizer::new(
            ["id", "energy_consumption", "temperature", "alarm_triggered"],
            ["energy_consumption", "temperature"],
        );

        let records = normalizer.normalize(&[json!(["A1", "1,200", null, "true"])]);

        let mut expected = Record::new();
        expected.insert("id", FieldValue::Text("A1".into()));
        expected.insert("energy_consumption", FieldValue::Number(1200.0));
        expected.insert("temperature", FieldValue::Number(0.0));
        expected.insert("alarm_triggered", FieldValue::Text("true".into()));

        assert_eq!(records, vec![expected]);
    }

    #[rstest]
    #[case(json!(42), 42.0)]
    #[case(json!(12.5), 12.5)]
    #[case(json!("1,234,567.5"), 1_234_567.5)]
    #[case(json!(" 81.2 "), 81.2)]
    #[case(json!(""), 0.0)]
    #[case(json!("n/a"), 0.0)]
    #[case(json!("NaN"), 0.0)]
    #[case(json!("inf"), 0.0)]
    #[case(json!(true), 0.0)]
    #[case(json!(null), 0.0)]
    fn test_numeric_coercion(#[case] cell: Value, #[case] expected: f64) {
        assert_eq!(coerce_number(&cell), expected);
    }

    #[rstest]
    #[case(json!("OPEN"), "OPEN")]
    #[case(json!(null), "")]
    #[case(json!(false), "false")]
    #[case(json!(7), "7")]
    fn test_text_coercion(#[case] cell: Value, #[case] expected: &str) {
        assert_eq!(coerce_text(&cell), expected);
    }

    #[test]
    fn test_short_row_leaves_keys_absent() {
        let normalizer = Normalizer::new(["a", "b", "c"], ["b"]);
        let record = normalizer.normalize_row(&json!(["x"]));

        assert_eq!(record.len(), 1);
        assert_eq!(record.text("a"), Some("x"));
        assert!(record.get("b").is_none());
        assert!(record.get("c").is_none());
    }

    #[test]
    fn test_long_row_ignores_extra_values() {
        let normalizer = Normalizer::new(["a"], Vec::<String>::new());
        let record = normalizer.normalize_row(&json!(["x", "y", "z"]));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_non_array_row_is_empty() {
        let normalizer = Normalizer::telemetry();
        assert!(normalizer.normalize_row(&json!({"pressure": 5})).is_empty());
    }

    #[test]
    fn test_telemetry_schema_row() {
        let normalizer = Normalizer::telemetry();
        let row = json!([
            "PUMP-1", "2025-03-01T10:00:05Z", "r-1", "false", "IDLE",
            "35.2", "1,020", "78.4", "1800", "RUNNING",
            "SEG-1", "55", "2025-03-01T10:00:00Z", "OPEN"
        ]);

        let record = normalizer.normalize_row(&row);

        assert_eq!(record.len(), FEED_COLUMNS.len());
        assert_eq!(record.number("flow_rate"), Some(1020.0));
        assert_eq!(record.number("pressure"), Some(78.4));
        assert_eq!(record.text("segment_id"), Some("SEG-1"));
        assert_eq!(record.text("valve_status"), Some("OPEN"));
    }
}
