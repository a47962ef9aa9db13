//! Sample aggregation
//!
//! Collapses one epoch's worth of raw radar samples into a `SleepEpoch`:
//! - Respiration: mean over valid readings
//! - Motion: peak reading (captures the largest disturbance)
//! - Heart rate: mean and sample standard deviation over valid readings
//!
//! Missing data is replaced with fixed defaults rather than zeros so that an
//! empty channel does not drag thresholds toward "quiet".

use crate::stats::Moments;
use crate::types::{RadarSample, SleepEpoch, DEFAULT_EPOCH_SECONDS};

/// Respiratory rate substituted when no valid reading exists
pub const DEFAULT_RESP_RATE: f32 = 15.0;
/// Heart-rate mean substituted when no valid reading exists
pub const DEFAULT_HEART_RATE_MEAN: f32 = 70.0;
/// Heart-rate spread substituted when no valid reading exists
pub const DEFAULT_HEART_RATE_STD: f32 = 2.0;

/// Aggregator for turning raw samples into epochs
pub struct EpochAggregator;

impl EpochAggregator {
    /// Aggregate a group of samples into one epoch.
    ///
    /// Returns `None` for an empty group; the caller skips that period.
    /// A `duration_seconds` of 0 is stored as the 60 s default.
    pub fn aggregate(samples: &[RadarSample], duration_seconds: u32) -> Option<SleepEpoch> {
        if samples.is_empty() {
            return None;
        }

        let resp = Moments::of(
            samples
                .iter()
                .filter(|s| s.has_valid_respiration())
                .map(|s| s.respiratory_rate_bpm as f32),
        );
        let respiratory_rate_bpm = if resp.count > 0 {
            resp.mean
        } else {
            DEFAULT_RESP_RATE
        };

        let motion_index = samples
            .iter()
            .map(|s| s.motion_level as f32)
            .fold(0.0f32, f32::max);

        let hr = Moments::of(
            samples
                .iter()
                .filter(|s| s.has_valid_heart_rate())
                .map(|s| s.heart_rate_bpm as f32),
        );
        let (heart_rate_mean, heart_rate_std) = if hr.count > 0 {
            (hr.mean, hr.stddev)
        } else {
            (DEFAULT_HEART_RATE_MEAN, DEFAULT_HEART_RATE_STD)
        };

        Some(SleepEpoch {
            respiratory_rate_bpm,
            motion_index,
            heart_rate_mean,
            heart_rate_std,
            duration_seconds: if duration_seconds > 0 {
                duration_seconds
            } else {
                DEFAULT_EPOCH_SECONDS
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(readings: &[(u8, u8, u8)]) -> Vec<RadarSample> {
        readings
            .iter()
            .map(|&(hr, rr, mv)| RadarSample::new(hr, rr, mv))
            .collect()
    }

    #[test]
    fn test_empty_group_produces_nothing() {
        assert!(EpochAggregator::aggregate(&[], 30).is_none());
    }

    #[test]
    fn test_respiration_mean_skips_invalid() {
        let group = samples(&[(70, 12, 0), (70, 0, 0), (70, 16, 0), (70, 40, 0)]);
        let epoch = EpochAggregator::aggregate(&group, 30).unwrap();
        assert!((epoch.respiratory_rate_bpm - 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_motion_is_peak() {
        let group = samples(&[(70, 14, 3), (70, 14, 42), (70, 14, 7)]);
        let epoch = EpochAggregator::aggregate(&group, 30).unwrap();
        assert_eq!(epoch.motion_index, 42.0);
    }

    #[test]
    fn test_heart_rate_sample_stddev() {
        let group = samples(&[(60, 14, 0), (64, 14, 0), (200, 14, 0), (0, 14, 0)]);
        let epoch = EpochAggregator::aggregate(&group, 30).unwrap();
        assert!((epoch.heart_rate_mean - 62.0).abs() < 1e-6);
        // Two valid values 60 and 64: sample variance = 8
        assert!((epoch.heart_rate_std - 8.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_defaults_when_channels_missing() {
        let group = samples(&[(0, 0, 5), (255, 0, 2)]);
        let epoch = EpochAggregator::aggregate(&group, 30).unwrap();
        assert_eq!(epoch.respiratory_rate_bpm, DEFAULT_RESP_RATE);
        assert_eq!(epoch.heart_rate_mean, DEFAULT_HEART_RATE_MEAN);
        assert_eq!(epoch.heart_rate_std, DEFAULT_HEART_RATE_STD);
        assert_eq!(epoch.motion_index, 5.0);
    }

    #[test]
    fn test_duration_defaulting() {
        let group = samples(&[(70, 14, 0)]);
        assert_eq!(EpochAggregator::aggregate(&group, 30).unwrap().duration_seconds, 30);
        assert_eq!(EpochAggregator::aggregate(&group, 0).unwrap().duration_seconds, 60);
    }
}
