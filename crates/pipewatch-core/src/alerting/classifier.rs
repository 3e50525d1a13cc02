//! Threshold classification
//!
//! One rule for every monitored metric: strictly above the threshold is
//! critical, within the top 5% below it (inclusive) is a warning.

use crate::models::Severity;

/// Fraction of the threshold where the warning band starts
pub const WARNING_RATIO: f64 = 0.95;

/// Classify a reading against its threshold
pub fn classify(current: f64, threshold: f64) -> Severity {
    if current > threshold {
        Severity::Critical
    } else if current >= threshold * WARNING_RATIO {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

impl Severity {
    /// Classify a reading against its threshold
    pub fn classify(current: f64, threshold: f64) -> Self {
        classify(current, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(75.0, Severity::Normal)]
    #[case(76.0, Severity::Warning)]
    #[case(79.99, Severity::Warning)]
    #[case(80.0, Severity::Warning)]
    #[case(80.01, Severity::Critical)]
    #[case(0.0, Severity::Normal)]
    fn test_pressure_boundaries(#[case] current: f64, #[case] expected: Severity) {
        assert_eq!(classify(current, 80.0), expected);
    }

    #[rstest]
    #[case(57.0, 60.0)]
    #[case(950.0, 1000.0)]
    #[case(38.0, 40.0)]
    fn test_default_thresholds_warn_at_band_edge(#[case] current: f64, #[case] threshold: f64) {
        assert_eq!(classify(current, threshold), Severity::Warning);
        assert_eq!(classify(current - 0.01, threshold), Severity::Normal);
        assert_eq!(classify(threshold + 0.01, threshold), Severity::Critical);
    }

    proptest! {
        #[test]
        fn classification_is_monotonic(
            threshold in 0.1f64..10_000.0,
            a in -1_000.0f64..20_000.0,
            b in -1_000.0f64..20_000.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(classify(low, threshold) <= classify(high, threshold));
        }

        #[test]
        fn critical_iff_strictly_above(threshold in 0.1f64..10_000.0, current in 0.0f64..20_000.0) {
            prop_assert_eq!(
                classify(current, threshold) == Severity::Critical,
                current > threshold
            );
        }
    }
}
