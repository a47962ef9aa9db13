//! Engine configuration
//!
//! Every tunable constant of the pipeline lives here with its default.
//! Configurations round-trip through JSON so a device can ship its own
//! tuning without a rebuild.

use crate::error::SleepError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sample cadence and epoch sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Raw samples collapsed into one epoch
    pub samples_per_epoch: usize,
    /// Seconds between raw samples
    pub sample_period_secs: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples_per_epoch: 10,
            sample_period_secs: 3,
        }
    }
}

impl SamplingConfig {
    /// Length of one epoch in seconds
    pub fn epoch_seconds(&self) -> u32 {
        u32::try_from(self.samples_per_epoch)
            .unwrap_or(u32::MAX)
            .saturating_mul(self.sample_period_secs)
    }
}

/// History sizing and threshold window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum epochs kept in memory
    pub capacity: usize,
    /// Trailing epochs used to estimate thresholds
    pub threshold_window: usize,
    /// Below this many epochs the conservative default thresholds apply
    pub min_threshold_epochs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            threshold_window: 40,
            min_threshold_epochs: 10,
        }
    }
}

/// Onset/wake hysteresis constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Motion strictly below this counts as quiet
    pub motion_sleep_max: f32,
    /// Motion strictly above this counts as active
    pub motion_wake_thresh: f32,
    pub resp_sleep_min: f32,
    pub resp_sleep_max: f32,
    /// Heart rate strictly above this counts as active
    pub hr_wake_thresh: f32,
    /// Required drop from the awake baseline to confirm onset
    pub hr_drop_required: f32,
    /// Heart rate below this confirms onset regardless of baseline
    pub hr_sleep_absolute: f32,
    /// Heart rate above this is trusted as a baseline reading
    pub hr_baseline_min: f32,
    /// Quiet epochs needed before onset can be confirmed
    pub onset_window_epochs: u32,
    /// Consecutive Wake epochs that confirm a real awakening
    pub wake_confirm_epochs: u32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            motion_sleep_max: 15.0,
            motion_wake_thresh: 40.0,
            resp_sleep_min: 10.0,
            resp_sleep_max: 25.0,
            hr_wake_thresh: 95.0,
            hr_drop_required: 5.0,
            hr_sleep_absolute: 75.0,
            hr_baseline_min: 50.0,
            onset_window_epochs: 10,
            wake_confirm_epochs: 3,
        }
    }
}

/// Output queue sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Records buffered for the uploader before the oldest is dropped
    pub queue_capacity: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { queue_capacity: 32 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    pub sampling: SamplingConfig,
    pub history: HistoryConfig,
    pub onset: OnsetConfig,
    pub publish: PublishConfig,
}

impl SleepConfig {
    /// Load config from file, or fall back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, SleepError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), SleepError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, SleepError> {
        let config: SleepConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SleepError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), SleepError> {
        if self.sampling.samples_per_epoch == 0 {
            return Err(SleepError::Config(
                "sampling.samples_per_epoch must be positive".to_string(),
            ));
        }
        if self.sampling.sample_period_secs == 0 {
            return Err(SleepError::Config(
                "sampling.sample_period_secs must be positive".to_string(),
            ));
        }
        if self.history.capacity == 0 {
            return Err(SleepError::Config(
                "history.capacity must be positive".to_string(),
            ));
        }
        if self.history.threshold_window == 0 {
            return Err(SleepError::Config(
                "history.threshold_window must be positive".to_string(),
            ));
        }
        if self.onset.resp_sleep_min > self.onset.resp_sleep_max {
            return Err(SleepError::Config(format!(
                "onset.resp_sleep_min ({}) exceeds onset.resp_sleep_max ({})",
                self.onset.resp_sleep_min, self.onset.resp_sleep_max
            )));
        }
        if self.onset.onset_window_epochs == 0 || self.onset.wake_confirm_epochs == 0 {
            return Err(SleepError::Config(
                "onset windows must be at least one epoch".to_string(),
            ));
        }
        if self.publish.queue_capacity == 0 {
            return Err(SleepError::Config(
                "publish.queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
