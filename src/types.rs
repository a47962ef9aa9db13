//! Core types for the sleep-radar pipeline
//!
//! This module defines the data structures that flow through each stage:
//! raw radar samples, aggregated epochs, per-epoch stage results, adaptive
//! thresholds, the onset state and the nightly quality report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Valid heart-rate range reported by the radar (bpm)
pub const HEART_RATE_VALID_MIN: u8 = 60;
pub const HEART_RATE_VALID_MAX: u8 = 120;

/// Maximum valid respiratory rate (breaths/min). Zero means "no reading".
pub const RESP_RATE_VALID_MAX: u8 = 35;

/// Upper bound of the body-movement scale
pub const MOTION_LEVEL_MAX: u8 = 100;

/// Duration substituted for epochs whose `duration_seconds` was never set
pub const DEFAULT_EPOCH_SECONDS: u32 = 60;

/// One scalar reading set from the radar, taken at the sample cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarSample {
    /// Heart rate (bpm); values outside 60..=120 are treated as invalid
    pub heart_rate_bpm: u8,
    /// Respiratory rate (breaths/min); 0 means invalid or absent
    pub respiratory_rate_bpm: u8,
    /// Body movement level, 0..=100
    pub motion_level: u8,
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl RadarSample {
    pub fn new(heart_rate_bpm: u8, respiratory_rate_bpm: u8, motion_level: u8) -> Self {
        Self {
            heart_rate_bpm,
            respiratory_rate_bpm,
            motion_level,
            timestamp: Utc::now(),
        }
    }

    pub fn has_valid_heart_rate(&self) -> bool {
        (HEART_RATE_VALID_MIN..=HEART_RATE_VALID_MAX).contains(&self.heart_rate_bpm)
    }

    pub fn has_valid_respiration(&self) -> bool {
        self.respiratory_rate_bpm > 0 && self.respiratory_rate_bpm <= RESP_RATE_VALID_MAX
    }
}

/// One fixed-duration aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepEpoch {
    /// Mean respiratory rate over the window (breaths/min)
    pub respiratory_rate_bpm: f32,
    /// Peak body movement over the window
    pub motion_index: f32,
    /// Mean heart rate over the window (bpm)
    pub heart_rate_mean: f32,
    /// Sample standard deviation of heart rate (HRV proxy)
    pub heart_rate_std: f32,
    /// Window length; 0 is read as 60 s
    pub duration_seconds: u32,
}

impl SleepEpoch {
    /// Duration in seconds with the unset-duration default applied
    pub fn effective_duration(&self) -> f32 {
        if self.duration_seconds > 0 {
            self.duration_seconds as f32
        } else {
            DEFAULT_EPOCH_SECONDS as f32
        }
    }
}

/// Sleep stage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepStage {
    #[default]
    Unknown,
    Wake,
    Rem,
    Nrem,
}

impl SleepStage {
    /// Wire label used by the upload endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::Unknown => "UNKNOWN",
            SleepStage::Wake => "WAKE",
            SleepStage::Rem => "REM",
            SleepStage::Nrem => "NREM",
        }
    }

    pub fn is_sleep(&self) -> bool {
        matches!(self, SleepStage::Rem | SleepStage::Nrem)
    }
}

impl std::fmt::Display for SleepStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one epoch, index-aligned with the epochs
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SleepStageResult {
    pub stage: SleepStage,
    pub respiratory_rate_bpm: f32,
    /// Median-smoothed motion index
    pub motion_index: f32,
    pub heart_rate_mean: f32,
    pub heart_rate_std: f32,
}

impl SleepStageResult {
    /// Result carrying the epoch's raw values under a fixed stage
    pub fn labeled(epoch: &SleepEpoch, stage: SleepStage) -> Self {
        Self {
            stage,
            respiratory_rate_bpm: epoch.respiratory_rate_bpm,
            motion_index: epoch.motion_index,
            heart_rate_mean: epoch.heart_rate_mean,
            heart_rate_std: epoch.heart_rate_std,
        }
    }
}

/// Adaptive classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepThresholds {
    /// mean(RR) + sd(RR)
    pub resp_rate_threshold: f32,
    /// mean(Mov) + sd(Mov)
    pub motion_threshold: f32,
    /// mean(Mov)
    pub wake_motion_threshold: f32,
    /// mean(HR_mean)
    pub heart_rate_mean: f32,
    /// heart_rate_mean + 0.5 * sd(HR_mean)
    pub heart_rate_wake_threshold: f32,
    /// mean(HR_std) + sd(HR_std)
    pub hrv_rem_threshold: f32,
}

impl Default for SleepThresholds {
    /// Conservative values used until enough epochs exist to estimate.
    fn default() -> Self {
        Self {
            resp_rate_threshold: 20.0,
            motion_threshold: 30.0,
            wake_motion_threshold: 20.0,
            heart_rate_mean: 65.0,
            heart_rate_wake_threshold: 75.0,
            hrv_rem_threshold: 5.0,
        }
    }
}

/// Sub-scores that make up the final sleep score, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub efficiency: f32,
    pub rem: f32,
    pub stability: f32,
    pub continuity: f32,
}

/// Aggregate sleep quality over the whole history
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SleepQualityReport {
    pub wake_seconds: u32,
    pub rem_seconds: u32,
    pub nrem_seconds: u32,
    /// (REM + NREM) / total, 0-1
    pub sleep_efficiency: f32,
    /// REM / (REM + NREM), 0-1
    pub rem_ratio: f32,
    pub average_resp_rate: f32,
    /// Average of the smoothed motion index
    pub average_motion: f32,
    pub average_heart_rate: f32,
    pub average_hrv: f32,
    /// Number of stage changes between consecutive epochs
    pub transitions: u32,
    pub transitions_per_hour: f32,
    pub breakdown: ScoreBreakdown,
    /// Weighted 0-100 score
    pub sleep_score: f32,
}

/// Onset/wake state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetPhase {
    #[default]
    Monitoring,
    Settling,
    Sleeping,
}

impl OnsetPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnsetPhase::Monitoring => "monitoring",
            OnsetPhase::Settling => "settling",
            OnsetPhase::Sleeping => "sleeping",
        }
    }
}

/// Mutable state of the onset/wake state machine
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OnsetState {
    pub phase: OnsetPhase,
    /// Consecutive-ish quiet epochs observed while settling
    pub settling_count: u32,
    /// Awake heart rate used to confirm the onset drop; 0 until first seen
    pub baseline_heart_rate: f32,
    /// Consecutive Wake classifications while sleeping
    pub wake_count: u32,
}

/// Record handed to the external uploader once per epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecord {
    pub heart_rate: i32,
    pub breathing_rate: i32,
    pub sleep_status: SleepStage,
}

impl PublishedRecord {
    /// A record with no usable rate is not worth uploading
    pub fn is_publishable(&self) -> bool {
        self.heart_rate > 0 || self.breathing_rate > 0
    }
}
