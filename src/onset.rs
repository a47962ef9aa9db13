//! Sleep onset and wake detection
//!
//! A hysteresis state machine that decides, one epoch at a time, whether the
//! subject is awake (`Monitoring`), lying still and possibly drifting off
//! (`Settling`) or confirmed asleep (`Sleeping`).
//!
//! Onset needs a run of quiet epochs plus a heart-rate drop from the awake
//! baseline (or an absolutely low heart rate). Waking needs either clear
//! activity or several consecutive Wake classifications; shorter Wake runs
//! are treated as micro-arousals.

use crate::config::OnsetConfig;
use crate::types::{OnsetPhase, OnsetState, SleepEpoch, SleepStage};
use serde::{Deserialize, Serialize};

/// Why the state machine changed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Monitoring -> Settling
    QuietDetected,
    /// Settling -> Sleeping
    OnsetConfirmed,
    /// Settling or Sleeping -> Monitoring on clear activity
    ActivityDetected,
    /// Settling -> Monitoring after ambiguous epochs drained the counter
    SettlingDecayed,
    /// Sleeping -> Monitoring after consecutive Wake classifications
    AwakeningConfirmed,
}

/// Outcome of one state machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnsetStep {
    pub from: OnsetPhase,
    pub to: OnsetPhase,
    pub reason: Option<TransitionReason>,
    /// Stage of the newest epoch, when classification ran
    pub newest_stage: Option<SleepStage>,
    /// The newest epoch was a tolerated Wake and should be relabeled NREM
    pub micro_arousal: bool,
}

impl OnsetStep {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Vital-sign cues derived from one epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochCues {
    pub motion: f32,
    pub resp: f32,
    pub heart_rate: f32,
}

impl EpochCues {
    pub fn from_epoch(epoch: &SleepEpoch) -> Self {
        Self {
            motion: epoch.motion_index,
            resp: epoch.respiratory_rate_bpm,
            heart_rate: epoch.heart_rate_mean,
        }
    }

    pub fn is_quiet(&self, config: &OnsetConfig) -> bool {
        self.motion < config.motion_sleep_max
            && self.resp >= config.resp_sleep_min
            && self.resp <= config.resp_sleep_max
            && self.resp > 0.0
    }

    pub fn is_active(&self, config: &OnsetConfig) -> bool {
        self.motion > config.motion_wake_thresh || self.heart_rate > config.hr_wake_thresh
    }
}

/// Onset/wake state machine
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    config: OnsetConfig,
    state: OnsetState,
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new(OnsetConfig::default())
    }
}

impl OnsetDetector {
    /// Create a detector in the `Monitoring` phase
    pub fn new(config: OnsetConfig) -> Self {
        Self {
            config,
            state: OnsetState::default(),
        }
    }

    pub fn state(&self) -> &OnsetState {
        &self.state
    }

    pub fn phase(&self) -> OnsetPhase {
        self.state.phase
    }

    /// Advance the state machine by one epoch.
    ///
    /// `classify` is only invoked while sleeping and without clear activity;
    /// it must return the stage of the newest epoch.
    pub fn step<F>(&mut self, epoch: &SleepEpoch, classify: F) -> OnsetStep
    where
        F: FnOnce() -> SleepStage,
    {
        let cues = EpochCues::from_epoch(epoch);
        let quiet = cues.is_quiet(&self.config);
        let active = cues.is_active(&self.config);
        let from = self.state.phase;

        let mut step = OnsetStep {
            from,
            to: from,
            reason: None,
            newest_stage: None,
            micro_arousal: false,
        };

        match from {
            OnsetPhase::Monitoring => {
                if self.state.baseline_heart_rate <= 0.0
                    && cues.heart_rate > self.config.hr_baseline_min
                {
                    self.state.baseline_heart_rate = cues.heart_rate;
                }
                if quiet && !active {
                    self.state.phase = OnsetPhase::Settling;
                    self.state.settling_count = 1;
                    step.reason = Some(TransitionReason::QuietDetected);
                }
            }
            OnsetPhase::Settling => {
                if active {
                    self.enter_monitoring(None);
                    step.reason = Some(TransitionReason::ActivityDetected);
                } else if quiet {
                    self.state.settling_count = self.state.settling_count.saturating_add(1);
                    if self.state.settling_count >= self.config.onset_window_epochs
                        && self.heart_rate_dropped(cues.heart_rate)
                    {
                        self.state.phase = OnsetPhase::Sleeping;
                        self.state.wake_count = 0;
                        step.reason = Some(TransitionReason::OnsetConfirmed);
                    }
                } else {
                    self.state.settling_count = self.state.settling_count.saturating_sub(1);
                    if self.state.settling_count == 0 {
                        self.enter_monitoring(None);
                        step.reason = Some(TransitionReason::SettlingDecayed);
                    }
                }
            }
            OnsetPhase::Sleeping => {
                if active {
                    self.enter_monitoring(Some(cues.heart_rate));
                    step.reason = Some(TransitionReason::ActivityDetected);
                } else {
                    let stage = classify();
                    step.newest_stage = Some(stage);
                    if stage == SleepStage::Wake {
                        self.state.wake_count += 1;
                        if self.state.wake_count >= self.config.wake_confirm_epochs {
                            self.enter_monitoring(Some(cues.heart_rate));
                            step.reason = Some(TransitionReason::AwakeningConfirmed);
                        } else {
                            step.micro_arousal = true;
                        }
                    } else {
                        self.state.wake_count = 0;
                    }
                }
            }
        }

        step.to = self.state.phase;
        step
    }

    /// Onset confirmation: a large enough drop from the awake baseline, or a
    /// heart rate that is low in absolute terms
    fn heart_rate_dropped(&self, heart_rate: f32) -> bool {
        self.state.baseline_heart_rate - heart_rate >= self.config.hr_drop_required
            || heart_rate < self.config.hr_sleep_absolute
    }

    fn enter_monitoring(&mut self, new_baseline: Option<f32>) {
        self.state.phase = OnsetPhase::Monitoring;
        self.state.settling_count = 0;
        self.state.wake_count = 0;
        if let Some(baseline) = new_baseline {
            self.state.baseline_heart_rate = baseline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(motion: f32, resp: f32, hr: f32) -> SleepEpoch {
        SleepEpoch {
            respiratory_rate_bpm: resp,
            motion_index: motion,
            heart_rate_mean: hr,
            heart_rate_std: 1.5,
            duration_seconds: 30,
        }
    }

    fn quiet(hr: f32) -> SleepEpoch {
        epoch(3.0, 14.0, hr)
    }

    fn unreachable_classifier() -> SleepStage {
        panic!("classification must only run while sleeping")
    }

    fn sleeping_detector() -> OnsetDetector {
        let mut detector = OnsetDetector::default();
        for _ in 0..10 {
            detector.step(&quiet(62.0), unreachable_classifier);
        }
        assert_eq!(detector.phase(), OnsetPhase::Sleeping);
        detector
    }

    #[test]
    fn test_quiet_epoch_starts_settling() {
        let mut detector = OnsetDetector::default();
        let step = detector.step(&quiet(80.0), unreachable_classifier);

        assert_eq!(step.reason, Some(TransitionReason::QuietDetected));
        assert_eq!(detector.state().settling_count, 1);
        assert_eq!(detector.state().baseline_heart_rate, 80.0);
    }

    #[test]
    fn test_onset_confirmed_on_tenth_quiet_epoch() {
        let mut detector = OnsetDetector::default();
        for i in 0..9 {
            let step = detector.step(&quiet(80.0), unreachable_classifier);
            assert_ne!(step.to, OnsetPhase::Sleeping, "slept early at epoch {}", i + 1);
        }
        assert_eq!(detector.phase(), OnsetPhase::Settling);
        assert_eq!(detector.state().settling_count, 9);

        // Drop of 10 bpm from the baseline of 80
        let step = detector.step(&quiet(70.0), unreachable_classifier);
        assert_eq!(step.reason, Some(TransitionReason::OnsetConfirmed));
        assert_eq!(detector.phase(), OnsetPhase::Sleeping);
    }

    #[test]
    fn test_onset_waits_for_heart_rate_drop() {
        let mut detector = OnsetDetector::default();
        for _ in 0..12 {
            detector.step(&quiet(80.0), unreachable_classifier);
        }
        assert_eq!(detector.phase(), OnsetPhase::Settling);
        assert_eq!(detector.state().settling_count, 12);

        detector.step(&quiet(74.0), unreachable_classifier);
        assert_eq!(detector.phase(), OnsetPhase::Sleeping);
    }

    #[test]
    fn test_activity_resets_settling() {
        let mut detector = OnsetDetector::default();
        for _ in 0..5 {
            detector.step(&quiet(70.0), unreachable_classifier);
        }
        let step = detector.step(&epoch(60.0, 14.0, 70.0), unreachable_classifier);
        assert_eq!(step.reason, Some(TransitionReason::ActivityDetected));
        assert_eq!(detector.state().settling_count, 0);
        assert_eq!(detector.phase(), OnsetPhase::Monitoring);
    }

    #[test]
    fn test_ambiguous_epochs_drain_settling() {
        let mut detector = OnsetDetector::default();
        detector.step(&quiet(70.0), unreachable_classifier);
        detector.step(&quiet(70.0), unreachable_classifier);

        // Motion between the quiet and active limits
        let ambiguous = epoch(25.0, 14.0, 70.0);
        detector.step(&ambiguous, unreachable_classifier);
        assert_eq!(detector.phase(), OnsetPhase::Settling);
        assert_eq!(detector.state().settling_count, 1);

        let step = detector.step(&ambiguous, unreachable_classifier);
        assert_eq!(step.reason, Some(TransitionReason::SettlingDecayed));
        assert_eq!(detector.phase(), OnsetPhase::Monitoring);
    }

    #[test]
    fn test_micro_arousal_is_tolerated() {
        let mut detector = sleeping_detector();

        let first = detector.step(&quiet(62.0), || SleepStage::Wake);
        let second = detector.step(&quiet(62.0), || SleepStage::Wake);
        assert!(first.micro_arousal && second.micro_arousal);
        assert_eq!(detector.state().wake_count, 2);

        let third = detector.step(&quiet(62.0), || SleepStage::Nrem);
        assert!(!third.changed());
        assert_eq!(detector.phase(), OnsetPhase::Sleeping);
        assert_eq!(detector.state().wake_count, 0);
    }

    #[test]
    fn test_three_wake_epochs_confirm_awakening() {
        let mut detector = sleeping_detector();
        detector.step(&quiet(66.0), || SleepStage::Wake);
        detector.step(&quiet(66.0), || SleepStage::Wake);
        let step = detector.step(&quiet(68.0), || SleepStage::Wake);

        assert_eq!(step.reason, Some(TransitionReason::AwakeningConfirmed));
        assert!(!step.micro_arousal);
        assert_eq!(detector.phase(), OnsetPhase::Monitoring);
        assert_eq!(detector.state().baseline_heart_rate, 68.0);
        assert_eq!(detector.state().wake_count, 0);
    }

    #[test]
    fn test_activity_while_sleeping_skips_classification() {
        let mut detector = sleeping_detector();
        let step = detector.step(&epoch(80.0, 18.0, 88.0), unreachable_classifier);

        assert_eq!(step.reason, Some(TransitionReason::ActivityDetected));
        assert_eq!(step.newest_stage, None);
        assert_eq!(detector.state().baseline_heart_rate, 88.0);
    }

    #[test]
    fn test_invalid_respiration_is_not_quiet() {
        let config = OnsetConfig {
            resp_sleep_min: 0.0,
            ..OnsetConfig::default()
        };
        let cues = EpochCues::from_epoch(&epoch(1.0, 0.0, 60.0));
        assert!(!cues.is_quiet(&config));
    }
}
