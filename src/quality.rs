//! Sleep quality scoring
//!
//! Reduces the full epoch/stage history into aggregate metrics and a single
//! 0-100 score built from four weighted sub-scores:
//! - Efficiency (40%): share of time spent asleep
//! - REM (30%): distance of the REM share from a healthy ~22%
//! - Stability (20%): average smoothed body movement
//! - Continuity (10%): stage transitions per hour
//!
//! The report is recomputed wholesale from the current history on every pass.

use crate::types::{ScoreBreakdown, SleepEpoch, SleepQualityReport, SleepStage, SleepStageResult};

const EFFICIENCY_WEIGHT: f32 = 0.40;
const REM_WEIGHT: f32 = 0.30;
const STABILITY_WEIGHT: f32 = 0.20;
const CONTINUITY_WEIGHT: f32 = 0.10;

/// Target REM share of sleep, in percent
const REM_TARGET_PCT: f32 = 22.0;

/// Quality scorer over epoch and stage sequences
pub struct QualityScorer;

impl QualityScorer {
    /// Build the quality report.
    ///
    /// `epochs` and `stages` are index-aligned; extra entries on either side
    /// are ignored. Empty input yields a zero-valued report.
    pub fn score(epochs: &[SleepEpoch], stages: &[SleepStageResult]) -> SleepQualityReport {
        let count = epochs.len().min(stages.len());
        if count == 0 {
            return SleepQualityReport::default();
        }
        let (epochs, stages) = (&epochs[..count], &stages[..count]);

        let mut total_seconds = 0.0f32;
        let mut wake_seconds = 0.0f32;
        let mut rem_seconds = 0.0f32;
        let mut nrem_seconds = 0.0f32;

        for (epoch, result) in epochs.iter().zip(stages) {
            let duration = epoch.effective_duration();
            total_seconds += duration;
            match result.stage {
                SleepStage::Wake => wake_seconds += duration,
                SleepStage::Rem => rem_seconds += duration,
                SleepStage::Nrem => nrem_seconds += duration,
                SleepStage::Unknown => {}
            }
        }

        let sleep_seconds = rem_seconds + nrem_seconds;
        let sleep_efficiency = if total_seconds > 0.0 {
            sleep_seconds / total_seconds
        } else {
            0.0
        };
        let rem_ratio = if sleep_seconds > 0.0 {
            rem_seconds / sleep_seconds
        } else {
            0.0
        };

        let n = count as f32;
        let average_resp_rate = epochs.iter().map(|e| e.respiratory_rate_bpm).sum::<f32>() / n;
        let average_heart_rate = epochs.iter().map(|e| e.heart_rate_mean).sum::<f32>() / n;
        let average_hrv = epochs.iter().map(|e| e.heart_rate_std).sum::<f32>() / n;
        let average_motion = stages.iter().map(|r| r.motion_index).sum::<f32>() / n;

        let transitions = stages
            .windows(2)
            .filter(|pair| pair[0].stage != pair[1].stage)
            .count() as u32;
        let hours = total_seconds / 3600.0;
        let transitions_per_hour = if hours > 0.0 {
            transitions as f32 / hours
        } else {
            0.0
        };

        let breakdown = ScoreBreakdown {
            efficiency: efficiency_score(sleep_efficiency * 100.0),
            rem: rem_score(rem_ratio * 100.0),
            stability: stability_score(average_motion),
            continuity: continuity_score(transitions_per_hour),
        };

        SleepQualityReport {
            wake_seconds: wake_seconds as u32,
            rem_seconds: rem_seconds as u32,
            nrem_seconds: nrem_seconds as u32,
            sleep_efficiency,
            rem_ratio,
            average_resp_rate,
            average_motion,
            average_heart_rate,
            average_hrv,
            transitions,
            transitions_per_hour,
            breakdown,
            sleep_score: weighted_score(&breakdown),
        }
    }
}

/// Combine the sub-scores into the final 0-100 score
pub fn weighted_score(b: &ScoreBreakdown) -> f32 {
    (EFFICIENCY_WEIGHT * b.efficiency
        + REM_WEIGHT * b.rem
        + STABILITY_WEIGHT * b.stability
        + CONTINUITY_WEIGHT * b.continuity)
        .clamp(0.0, 100.0)
}

/// 100 at >= 85%, linear 0..100 over [50, 85], 0 below 50%
pub fn efficiency_score(efficiency_pct: f32) -> f32 {
    let score = if efficiency_pct >= 85.0 {
        100.0
    } else if efficiency_pct >= 50.0 {
        (efficiency_pct - 50.0) / 35.0 * 100.0
    } else {
        0.0
    };
    score.clamp(0.0, 100.0)
}

/// 100 within 5 points of the target, 100..50 out to 15, then 50..0 out to 40
pub fn rem_score(rem_pct: f32) -> f32 {
    let deviation = (rem_pct - REM_TARGET_PCT).abs();
    let score = if deviation <= 5.0 {
        100.0
    } else if deviation <= 15.0 {
        100.0 - (deviation - 5.0) * 5.0
    } else {
        50.0 - (deviation - 15.0) * 2.0
    };
    score.clamp(0.0, 100.0)
}

/// 100 up to motion 10, 100..25 over (10, 50], then 25..0 over (50, 100]
pub fn stability_score(average_motion: f32) -> f32 {
    let score = if average_motion <= 10.0 {
        100.0
    } else if average_motion <= 50.0 {
        100.0 - (average_motion - 10.0) * 75.0 / 40.0
    } else {
        25.0 - (average_motion - 50.0) * 0.5
    };
    score.clamp(0.0, 100.0)
}

/// 100 up to 6 transitions/hour, 100..40 over (6, 15], flat 40 above
pub fn continuity_score(transitions_per_hour: f32) -> f32 {
    let score = if transitions_per_hour <= 6.0 {
        100.0
    } else if transitions_per_hour <= 15.0 {
        100.0 - (transitions_per_hour - 6.0) * 60.0 / 9.0
    } else {
        40.0
    };
    score.clamp(0.0, 100.0)
}
