//! Late / too-late classification
//!
//! Every received sample is measured against two bounds derived from the
//! entity's publish period. Each bound is the tighter of an absolute
//! microsecond limit and a percentage of the period, so both threshold
//! styles are always in effect.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Thresholds for classifying received samples
///
/// Percentage thresholds are relative to the publish period of the entity;
/// absolute thresholds are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingOptions {
    pub late_percentage: f64,
    pub late_absolute_us: i64,
    pub too_late_percentage: f64,
    pub too_late_absolute_us: i64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            late_percentage: 20.0,
            late_absolute_us: 5_000,
            too_late_percentage: 100.0,
            too_late_absolute_us: 50_000,
        }
    }
}

impl TrackingOptions {
    /// Reject negative or inconsistent thresholds at configuration time,
    /// never at classification time.
    pub fn validate(&self) -> Result<()> {
        if self.late_percentage < 0.0 || self.too_late_percentage < 0.0 {
            return Err(Error::Config("threshold percentages must be non-negative".to_string()));
        }
        if self.late_absolute_us < 0 || self.too_late_absolute_us < 0 {
            return Err(Error::Config("absolute thresholds must be non-negative".to_string()));
        }
        if self.late_percentage > self.too_late_percentage
            || self.late_absolute_us > self.too_late_absolute_us
        {
            return Err(Error::Config(
                "late thresholds must not exceed too-late thresholds".to_string(),
            ));
        }
        Ok(())
    }

    fn bound_us(period_us: u64, percentage: f64, absolute_us: i64) -> f64 {
        let absolute = absolute_us as f64;
        if period_us == 0 {
            // Event-driven entities have no meaningful period: the
            // percentage bound is treated as infinite.
            return absolute;
        }
        absolute.min(percentage / 100.0 * period_us as f64)
    }

    pub(crate) fn late_bound_us(&self, period_us: u64) -> f64 {
        Self::bound_us(period_us, self.late_percentage, self.late_absolute_us)
    }

    pub(crate) fn too_late_bound_us(&self, period_us: u64) -> f64 {
        Self::bound_us(period_us, self.too_late_percentage, self.too_late_absolute_us)
    }
}

/// Outcome of classifying one latency sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleVerdict {
    OnTime,
    Late,
    /// Past its useful window; counted as lost and kept out of the latency
    /// moments.
    TooLate,
}

/// Classify a latency sample against the entity's publish period.
pub fn classify(latency_us: u64, period_us: u64, options: &TrackingOptions) -> SampleVerdict {
    let latency = latency_us as f64;
    if latency > options.too_late_bound_us(period_us) {
        SampleVerdict::TooLate
    } else if latency > options.late_bound_us(period_us) {
        SampleVerdict::Late
    } else {
        SampleVerdict::OnTime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(TrackingOptions::default().validate().is_ok());
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let options = TrackingOptions { late_percentage: -1.0, ..Default::default() };
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_absolute_rejected() {
        let options = TrackingOptions { too_late_absolute_us: -5, ..Default::default() };
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let options = TrackingOptions {
            late_percentage: 150.0,
            too_late_percentage: 100.0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let options = TrackingOptions {
            late_absolute_us: 60_000,
            too_late_absolute_us: 50_000,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_classification_with_period() {
        let options = TrackingOptions::default();
        // 100ms period: late bound = min(5000, 20000) = 5000us,
        // too-late bound = min(50000, 100000) = 50000us
        let period_us = 100_000;

        assert_eq!(classify(1_000, period_us, &options), SampleVerdict::OnTime);
        assert_eq!(classify(6_000, period_us, &options), SampleVerdict::Late);
        assert_eq!(classify(60_000, period_us, &options), SampleVerdict::TooLate);
    }

    #[test]
    fn test_bound_is_exclusive() {
        let options = TrackingOptions::default();
        let period_us = 100_000;

        // A sample exactly on a bound has not exceeded it
        assert_eq!(classify(5_000, period_us, &options), SampleVerdict::OnTime);
        assert_eq!(classify(50_000, period_us, &options), SampleVerdict::Late);
        assert_eq!(classify(50_001, period_us, &options), SampleVerdict::TooLate);
    }

    #[test]
    fn test_percentage_bound_tighter_than_absolute() {
        let options = TrackingOptions::default();
        // 10ms period: 20% = 2000us beats the 5000us absolute bound
        assert_eq!(classify(3_000, 10_000, &options), SampleVerdict::Late);
        assert_eq!(classify(1_500, 10_000, &options), SampleVerdict::OnTime);
    }

    #[test]
    fn test_zero_period_uses_absolute_bounds_only() {
        let options = TrackingOptions::default();

        assert_eq!(classify(4_999, 0, &options), SampleVerdict::OnTime);
        assert_eq!(classify(5_001, 0, &options), SampleVerdict::Late);
        assert_eq!(classify(50_001, 0, &options), SampleVerdict::TooLate);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let options = TrackingOptions::default();
        let rank = |verdict: SampleVerdict| match verdict {
            SampleVerdict::OnTime => 0,
            SampleVerdict::Late => 1,
            SampleVerdict::TooLate => 2,
        };

        let mut previous = 0;
        for latency_us in (0..200_000u64).step_by(100) {
            let current = rank(classify(latency_us, 100_000, &options));
            assert!(current >= previous, "verdict regressed at {latency_us}us");
            previous = current;
        }
    }
}
