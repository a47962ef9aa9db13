//! Adaptive threshold estimation
//!
//! Thresholds are re-derived on every classification pass from a trailing
//! window of epochs:
//! - `resp_rate_threshold = mean(RR) + sd(RR)`
//! - `motion_threshold = mean(Mov) + sd(Mov)`
//! - `wake_motion_threshold = mean(Mov)`
//! - `heart_rate_wake_threshold = mean(HR) + 0.5 * sd(HR)`
//! - `hrv_rem_threshold = mean(HRV) + sd(HRV)`
//!
//! Standard deviations use the sample (N-1) variance. Windows shorter than
//! the configured minimum are too noisy to estimate from: `estimate` returns
//! the conservative defaults and `try_estimate` returns `None` so a caller
//! can keep its previous thresholds instead.

use crate::stats::Moments;
use crate::types::{SleepEpoch, SleepThresholds};
use tracing::warn;

/// Default trailing window size in epochs
pub const DEFAULT_THRESHOLD_WINDOW: usize = 40;
/// Minimum epochs required before thresholds are estimated
pub const DEFAULT_MIN_EPOCHS: usize = 10;

/// Epoch count from which degenerate thresholds are reported
const DEGENERACY_MIN_EPOCHS: usize = 5;

/// Estimator for adaptive classification thresholds
#[derive(Debug, Clone, Copy)]
pub struct ThresholdEstimator {
    window: usize,
    min_epochs: usize,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_WINDOW, DEFAULT_MIN_EPOCHS)
    }
}

impl ThresholdEstimator {
    pub fn new(window: usize, min_epochs: usize) -> Self {
        Self {
            window: window.max(1),
            min_epochs,
        }
    }

    /// The trailing slice of `epochs` this estimator looks at
    pub fn window_of<'a>(&self, epochs: &'a [SleepEpoch]) -> &'a [SleepEpoch] {
        &epochs[epochs.len().saturating_sub(self.window)..]
    }

    /// Estimate thresholds, or `None` if the window is too short
    pub fn try_estimate(&self, epochs: &[SleepEpoch]) -> Option<SleepThresholds> {
        let window = self.window_of(epochs);
        if window.is_empty() || window.len() < self.min_epochs {
            return None;
        }
        Some(compute_thresholds(window))
    }

    /// Estimate thresholds, falling back to the defaults on short windows
    pub fn estimate(&self, epochs: &[SleepEpoch]) -> SleepThresholds {
        self.try_estimate(epochs).unwrap_or_default()
    }
}

/// Apply the threshold formulas to every epoch in `window`
pub fn compute_thresholds(window: &[SleepEpoch]) -> SleepThresholds {
    if window.is_empty() {
        return SleepThresholds::default();
    }

    let rr = Moments::of(window.iter().map(|e| e.respiratory_rate_bpm));
    let mv = Moments::of(window.iter().map(|e| e.motion_index));
    let hr = Moments::of(window.iter().map(|e| e.heart_rate_mean));
    let hrv = Moments::of(window.iter().map(|e| e.heart_rate_std));

    SleepThresholds {
        resp_rate_threshold: rr.upper(1.0),
        motion_threshold: mv.upper(1.0),
        wake_motion_threshold: mv.mean,
        heart_rate_mean: hr.mean,
        heart_rate_wake_threshold: hr.upper(0.5),
        hrv_rem_threshold: hrv.upper(1.0),
    }
}

/// Whether thresholds look like they were estimated from all-zero input.
///
/// This is a diagnostic only; classification proceeds unchanged.
pub fn is_degenerate(thresholds: &SleepThresholds, epoch_count: usize) -> bool {
    epoch_count >= DEGENERACY_MIN_EPOCHS
        && (thresholds.motion_threshold < 1.0 || thresholds.resp_rate_threshold < 5.0)
}

/// Log a warning when `is_degenerate` holds; returns the check result
pub fn warn_if_degenerate(thresholds: &SleepThresholds, epoch_count: usize) -> bool {
    let degenerate = is_degenerate(thresholds, epoch_count);
    if degenerate {
        warn!(
            resp_rate_threshold = thresholds.resp_rate_threshold,
            motion_threshold = thresholds.motion_threshold,
            epochs = epoch_count,
            "threshold degeneracy: input may be all zeros"
        );
    }
    degenerate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(rr: f32, motion: f32, hr: f32, hrv: f32) -> SleepEpoch {
        SleepEpoch {
            respiratory_rate_bpm: rr,
            motion_index: motion,
            heart_rate_mean: hr,
            heart_rate_std: hrv,
            duration_seconds: 30,
        }
    }

    #[test]
    fn test_resp_threshold_uses_sample_variance() {
        let epochs: Vec<SleepEpoch> = [14.0, 16.0, 18.0, 20.0]
            .iter()
            .map(|&rr| epoch(rr, 0.0, 60.0, 1.0))
            .collect();
        let thresholds = compute_thresholds(&epochs);

        // mean 17, sample variance (9+1+1+9)/3 = 20/3
        let expected = 17.0 + (20.0f32 / 3.0).sqrt();
        assert!((thresholds.resp_rate_threshold - expected).abs() < 1e-5);
        assert!((thresholds.resp_rate_threshold - 19.581_99).abs() < 1e-4);
    }

    #[test]
    fn test_all_formulas() {
        let epochs = vec![
            epoch(12.0, 2.0, 60.0, 1.0),
            epoch(14.0, 4.0, 64.0, 3.0),
            epoch(16.0, 6.0, 68.0, 5.0),
        ];
        let t = compute_thresholds(&epochs);
        // Each series has sample sd equal to its step size
        assert!((t.motion_threshold - 6.0).abs() < 1e-5);
        assert!((t.wake_motion_threshold - 4.0).abs() < 1e-5);
        assert!((t.heart_rate_mean - 64.0).abs() < 1e-5);
        assert!((t.heart_rate_wake_threshold - 66.0).abs() < 1e-5);
        assert!((t.hrv_rem_threshold - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_short_window_uses_defaults() {
        let estimator = ThresholdEstimator::default();
        let epochs: Vec<SleepEpoch> = (0..9).map(|_| epoch(14.0, 1.0, 60.0, 1.0)).collect();
        assert!(estimator.try_estimate(&epochs).is_none());
        assert_eq!(estimator.estimate(&epochs), SleepThresholds::default());
        assert_eq!(estimator.estimate(&[]), SleepThresholds::default());
    }

    #[test]
    fn test_only_trailing_window_is_used() {
        let estimator = ThresholdEstimator::new(10, 10);
        let mut epochs: Vec<SleepEpoch> = (0..30).map(|_| epoch(30.0, 90.0, 100.0, 9.0)).collect();
        epochs.extend((0..10).map(|_| epoch(14.0, 2.0, 60.0, 1.0)));

        let t = estimator.estimate(&epochs);
        assert_eq!(t.resp_rate_threshold, 14.0);
        assert_eq!(t.wake_motion_threshold, 2.0);
    }

    #[test]
    fn test_degeneracy_check() {
        let zeros: Vec<SleepEpoch> = (0..12).map(|_| epoch(0.0, 0.0, 0.0, 0.0)).collect();
        let t = compute_thresholds(&zeros);
        assert!(warn_if_degenerate(&t, zeros.len()));
        assert!(!is_degenerate(&t, 4));
        assert!(!is_degenerate(&SleepThresholds::default(), 40));
    }
}
