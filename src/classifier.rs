//! Sleep stage classification
//!
//! Two passes over the epoch sequence:
//!
//! 1. Per-epoch decision with priority Wake > REM > NREM, using
//!    median-smoothed motion, respiration and heart-rate cues against the
//!    adaptive thresholds.
//! 2. Isolation correction: an interior epoch whose two neighbours agree with
//!    each other but not with it takes the neighbours' stage.
//!
//! Classification is a pure function of its inputs, so re-running it on the
//! same epochs and thresholds yields identical results.

use crate::stats::{median3, median5};
use crate::types::{SleepEpoch, SleepStage, SleepStageResult, SleepThresholds};

/// Stateless stage classifier
pub struct StageClassifier;

/// Boolean cues that feed the per-epoch decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageCues {
    pub motion_wake: bool,
    pub resp_rem_candidate: bool,
    pub high_motion: bool,
    pub hr_wake: bool,
    pub hrv_rem: bool,
    pub hr_nrem: bool,
}

impl StageCues {
    /// Evaluate the cues for one epoch given its smoothed motion
    pub fn evaluate(epoch: &SleepEpoch, smoothed_motion: f32, t: &SleepThresholds) -> Self {
        Self {
            motion_wake: smoothed_motion > t.wake_motion_threshold,
            resp_rem_candidate: epoch.respiratory_rate_bpm > t.resp_rate_threshold,
            high_motion: smoothed_motion > t.motion_threshold,
            hr_wake: epoch.heart_rate_mean > t.heart_rate_wake_threshold,
            hrv_rem: epoch.heart_rate_std > t.hrv_rem_threshold,
            hr_nrem: epoch.heart_rate_mean < t.heart_rate_mean
                && epoch.heart_rate_std < t.hrv_rem_threshold,
        }
    }

    /// Stage implied by these cues
    pub fn decide(&self) -> SleepStage {
        let is_wake = self.motion_wake || (self.high_motion && self.hr_wake);
        if is_wake {
            return SleepStage::Wake;
        }

        let is_rem = self.resp_rem_candidate
            && !self.high_motion
            && (self.hrv_rem || (self.resp_rem_candidate && !self.hr_nrem));
        if is_rem {
            SleepStage::Rem
        } else {
            SleepStage::Nrem
        }
    }
}

impl StageClassifier {
    /// Classify every epoch; the output is index-aligned with `epochs`
    pub fn classify(epochs: &[SleepEpoch], thresholds: &SleepThresholds) -> Vec<SleepStageResult> {
        let mut results: Vec<SleepStageResult> = epochs
            .iter()
            .enumerate()
            .map(|(i, epoch)| {
                let smoothed = smoothed_motion(epochs, i);
                let stage = StageCues::evaluate(epoch, smoothed, thresholds).decide();
                SleepStageResult {
                    stage,
                    respiratory_rate_bpm: epoch.respiratory_rate_bpm,
                    motion_index: smoothed,
                    heart_rate_mean: epoch.heart_rate_mean,
                    heart_rate_std: epoch.heart_rate_std,
                }
            })
            .collect();

        let stages: Vec<SleepStage> = results.iter().map(|r| r.stage).collect();
        for (result, stage) in results.iter_mut().zip(correct_isolated(&stages)) {
            result.stage = stage;
        }

        results
    }
}

/// Median-filtered motion at `index`.
///
/// Uses a 5-point window when i-2..=i+2 is in bounds, otherwise a 3-point
/// window with neighbours clamped to the sequence edges.
pub fn smoothed_motion(epochs: &[SleepEpoch], index: usize) -> f32 {
    let motion = |i: usize| epochs[i].motion_index;
    let last = epochs.len() - 1;

    if index >= 2 && index + 2 <= last {
        median5([
            motion(index - 2),
            motion(index - 1),
            motion(index),
            motion(index + 1),
            motion(index + 2),
        ])
    } else {
        let prev = motion(index.saturating_sub(1));
        let next = motion((index + 1).min(last));
        median3(prev, motion(index), next)
    }
}

/// Replace single-epoch flicker with the surrounding stage.
///
/// Decisions read the uncorrected input, so the result does not depend on
/// the order in which indices are visited.
pub fn correct_isolated(stages: &[SleepStage]) -> Vec<SleepStage> {
    let mut corrected = stages.to_vec();
    if stages.len() < 3 {
        return corrected;
    }
    for i in 1..stages.len() - 1 {
        let (prev, curr, next) = (stages[i - 1], stages[i], stages[i + 1]);
        if prev == next && prev != curr {
            corrected[i] = prev;
        }
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use SleepStage::{Nrem, Rem, Wake};

    fn epoch(rr: f32, motion: f32, hr: f32, hrv: f32) -> SleepEpoch {
        SleepEpoch {
            respiratory_rate_bpm: rr,
            motion_index: motion,
            heart_rate_mean: hr,
            heart_rate_std: hrv,
            duration_seconds: 30,
        }
    }

    fn thresholds() -> SleepThresholds {
        SleepThresholds {
            resp_rate_threshold: 16.0,
            motion_threshold: 20.0,
            wake_motion_threshold: 10.0,
            heart_rate_mean: 62.0,
            heart_rate_wake_threshold: 66.0,
            hrv_rem_threshold: 3.0,
        }
    }

    #[test]
    fn test_isolation_correction() {
        assert_eq!(correct_isolated(&[Wake, Nrem, Wake]), vec![Wake, Wake, Wake]);
        assert_eq!(correct_isolated(&[Wake, Nrem, Rem]), vec![Wake, Nrem, Rem]);
        assert_eq!(correct_isolated(&[Nrem, Nrem, Nrem]), vec![Nrem, Nrem, Nrem]);
        assert_eq!(correct_isolated(&[Wake, Nrem]), vec![Wake, Nrem]);
    }

    #[test]
    fn test_isolation_correction_reads_uncorrected_input() {
        // Alternating flicker: every interior index sees equal neighbours
        let input = [Wake, Nrem, Wake, Nrem, Wake];
        assert_eq!(correct_isolated(&input), vec![Wake, Wake, Nrem, Wake, Wake]);
    }

    #[test]
    fn test_smoothing_windows() {
        let epochs: Vec<SleepEpoch> = [0.0, 50.0, 1.0, 2.0, 3.0]
            .iter()
            .map(|&m| epoch(14.0, m, 60.0, 1.0))
            .collect();
        // Boundary: 3-point with clamped neighbour (0, 0, 50)
        assert_eq!(smoothed_motion(&epochs, 0), 0.0);
        // Near boundary: 3-point (0, 50, 1)
        assert_eq!(smoothed_motion(&epochs, 1), 1.0);
        // Interior: 5-point (0, 50, 1, 2, 3)
        assert_eq!(smoothed_motion(&epochs, 2), 2.0);
        // Last: 3-point (2, 3, 3)
        assert_eq!(smoothed_motion(&epochs, 4), 3.0);
    }

    #[test]
    fn test_cue_priority() {
        let t = thresholds();
        // Motion above the wake threshold wins over a REM breathing pattern
        assert_eq!(StageCues::evaluate(&epoch(20.0, 12.0, 60.0, 5.0), 12.0, &t).decide(), Wake);
        // Elevated breathing with high HRV and calm motion is REM
        assert_eq!(StageCues::evaluate(&epoch(20.0, 2.0, 60.0, 5.0), 2.0, &t).decide(), Rem);
        // Elevated breathing but a calm NREM heart pattern is not REM
        assert_eq!(StageCues::evaluate(&epoch(20.0, 2.0, 58.0, 1.0), 2.0, &t).decide(), Nrem);
        // Calm breathing is NREM
        assert_eq!(StageCues::evaluate(&epoch(14.0, 2.0, 60.0, 1.0), 2.0, &t).decide(), Nrem);
    }

    #[test]
    fn test_high_motion_with_hr_wake() {
        let mut t = thresholds();
        t.wake_motion_threshold = 50.0;
        let cues = StageCues::evaluate(&epoch(14.0, 30.0, 70.0, 1.0), 30.0, &t);
        assert!(cues.high_motion && cues.hr_wake && !cues.motion_wake);
        assert_eq!(cues.decide(), Wake);

        // High motion vetoes REM even with REM breathing
        let cues = StageCues::evaluate(&epoch(20.0, 30.0, 60.0, 5.0), 30.0, &t);
        assert_eq!(cues.decide(), Nrem);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let epochs: Vec<SleepEpoch> = (0..60)
            .map(|i| {
                let i = i as f32;
                epoch(
                    14.0 + (i * 0.7).sin() * 3.0,
                    (i * 1.3).cos().abs() * 15.0,
                    60.0 + (i * 0.4).sin() * 4.0,
                    1.0 + (i * 0.9).cos().abs() * 3.0,
                )
            })
            .collect();
        let t = thresholds();
        let first = StageClassifier::classify(&epochs, &t);
        let second = StageClassifier::classify(&epochs, &t);
        assert_eq!(first, second);
        assert_eq!(first.len(), epochs.len());
    }

    #[test]
    fn test_classify_empty() {
        assert!(StageClassifier::classify(&[], &thresholds()).is_empty());
    }

    #[test]
    fn test_classify_fills_smoothed_motion() {
        let epochs = vec![
            epoch(14.0, 0.0, 60.0, 1.0),
            epoch(14.0, 40.0, 60.0, 1.0),
            epoch(14.0, 0.0, 60.0, 1.0),
        ];
        let results = StageClassifier::classify(&epochs, &thresholds());
        // The lone spike is median-filtered away
        assert_eq!(results[1].motion_index, 0.0);
        assert!(results.iter().all(|r| r.stage == Nrem));
    }
}
