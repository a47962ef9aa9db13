//! Session pipeline
//!
//! `SleepSession` owns all per-night state and runs one pass per epoch:
//!
//! 1. EpochAggregator - collapse the epoch's samples (skipped if empty)
//! 2. EpochHistory - append, evicting the oldest epoch when full
//! 3. OnsetDetector - advance the onset/wake state machine
//! 4. ThresholdEstimator + StageClassifier - label the sleep segment
//! 5. QualityScorer - rebuild the report over the whole history
//! 6. PublishedRecord - newest stage plus rounded rates for the uploader
//!
//! The session is driven by an external scheduler through `tick` and never
//! blocks; all shared state lives in the `ingest` buffers.

use crate::aggregator::EpochAggregator;
use crate::classifier::StageClassifier;
use crate::config::SleepConfig;
use crate::history::EpochHistory;
use crate::ingest::{RecordQueue, SampleRing};
use crate::onset::{OnsetDetector, TransitionReason};
use crate::quality::QualityScorer;
use crate::thresholds::{warn_if_degenerate, ThresholdEstimator};
use crate::types::{
    OnsetPhase, OnsetState, PublishedRecord, RadarSample, SleepEpoch, SleepQualityReport,
    SleepStage, SleepThresholds,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of one epoch pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// 1-based count of epochs processed by this session
    pub epoch_index: u64,
    pub epoch: SleepEpoch,
    pub phase: OnsetPhase,
    pub transition: Option<TransitionReason>,
    /// Final label of the newest epoch
    pub stage: SleepStage,
    pub micro_arousal: bool,
    /// `None` when the record carried no usable rate
    pub record: Option<PublishedRecord>,
    pub report: SleepQualityReport,
}

/// Per-night staging context
#[derive(Debug, Clone)]
pub struct SleepSession {
    config: SleepConfig,
    history: EpochHistory,
    onset: OnsetDetector,
    estimator: ThresholdEstimator,
    /// Thresholds from the last successful estimate, defaults until then
    thresholds: SleepThresholds,
    /// History index of the first epoch of the current sleep segment
    sleep_start: Option<usize>,
    report: SleepQualityReport,
    last_night_report: Option<SleepQualityReport>,
    epochs_processed: u64,
}

impl Default for SleepSession {
    fn default() -> Self {
        Self::new(SleepConfig::default())
    }
}

impl SleepSession {
    /// Create a session in the Monitoring phase with an empty history
    pub fn new(config: SleepConfig) -> Self {
        Self {
            history: EpochHistory::new(config.history.capacity),
            onset: OnsetDetector::new(config.onset.clone()),
            estimator: ThresholdEstimator::new(
                config.history.threshold_window,
                config.history.min_threshold_epochs,
            ),
            thresholds: SleepThresholds::default(),
            sleep_start: None,
            report: SleepQualityReport::default(),
            last_night_report: None,
            epochs_processed: 0,
            config,
        }
    }

    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    pub fn history(&self) -> &EpochHistory {
        &self.history
    }

    pub fn phase(&self) -> OnsetPhase {
        self.onset.phase()
    }

    pub fn onset_state(&self) -> &OnsetState {
        self.onset.state()
    }

    pub fn thresholds(&self) -> &SleepThresholds {
        &self.thresholds
    }

    /// Report over the current history
    pub fn report(&self) -> &SleepQualityReport {
        &self.report
    }

    /// Report captured when the most recent sleeping phase ended
    pub fn last_night_report(&self) -> Option<&SleepQualityReport> {
        self.last_night_report.as_ref()
    }

    /// History index where the current sleep segment begins
    pub fn sleep_start(&self) -> Option<usize> {
        self.sleep_start
    }

    pub fn epochs_processed(&self) -> u64 {
        self.epochs_processed
    }

    /// Run one pass if the ring holds a full epoch of samples.
    ///
    /// A ready record is pushed to `records`; a skipped pass leaves all state
    /// untouched.
    pub fn tick(
        &mut self,
        ring: &SampleRing,
        records: &RecordQueue<PublishedRecord>,
    ) -> Option<SessionUpdate> {
        let samples = ring.take_if_full()?;
        let update = self.process_samples(&samples)?;
        if let Some(record) = update.record {
            records.push(record);
        }
        Some(update)
    }

    /// Aggregate one epoch's samples and process the result
    pub fn process_samples(&mut self, samples: &[RadarSample]) -> Option<SessionUpdate> {
        match EpochAggregator::aggregate(samples, self.config.sampling.epoch_seconds()) {
            Some(epoch) => Some(self.process_epoch(epoch)),
            None => {
                debug!("no samples for this period, skipping");
                None
            }
        }
    }

    /// Process one aggregated epoch
    pub fn process_epoch(&mut self, epoch: SleepEpoch) -> SessionUpdate {
        self.epochs_processed += 1;

        if self.history.push(epoch).is_some() {
            if let Some(start) = self.sleep_start.as_mut() {
                *start = start.saturating_sub(1);
            }
        }

        let step = {
            let history = &mut self.history;
            let thresholds = &mut self.thresholds;
            let estimator = &self.estimator;
            let start = self.sleep_start.unwrap_or(0);
            self.onset.step(&epoch, || {
                classify_segment(history, estimator, thresholds, start)
            })
        };

        match step.reason {
            Some(TransitionReason::OnsetConfirmed) => {
                // The segment opens with the epoch after the confirming one
                self.sleep_start = Some(self.history.len());
                info!(
                    epoch = self.epochs_processed,
                    baseline_hr = self.onset.state().baseline_heart_rate,
                    heart_rate = epoch.heart_rate_mean,
                    "sleep onset confirmed"
                );
            }
            Some(reason) if step.from == OnsetPhase::Sleeping => {
                self.sleep_start = None;
                self.last_night_report = Some(self.report);
                info!(
                    epoch = self.epochs_processed,
                    ?reason,
                    sleep_score = self.report.sleep_score,
                    "sleeping phase ended"
                );
            }
            Some(reason) => {
                info!(
                    epoch = self.epochs_processed,
                    from = step.from.as_str(),
                    to = step.to.as_str(),
                    ?reason,
                    "onset phase changed"
                );
            }
            None => {}
        }

        let newest = self.history.len().saturating_sub(1);
        if step.micro_arousal {
            self.history.pin_stage(newest, SleepStage::Nrem);
            debug!(
                wake_count = self.onset.state().wake_count,
                "micro-arousal relabeled NREM"
            );
        }

        match (self.onset.phase(), self.sleep_start) {
            (OnsetPhase::Sleeping, Some(start)) => {
                self.history.force_stage(0..start, SleepStage::Wake)
            }
            _ => self.history.force_stage(0..self.history.len(), SleepStage::Wake),
        }

        self.report = QualityScorer::score(&self.history.epochs(), &self.history.results());

        let stage = self
            .history
            .latest_result()
            .map(|r| r.stage)
            .unwrap_or_default();
        let record = PublishedRecord {
            heart_rate: epoch.heart_rate_mean.round() as i32,
            breathing_rate: epoch.respiratory_rate_bpm.round() as i32,
            sleep_status: stage,
        };
        let record = if record.is_publishable() {
            Some(record)
        } else {
            warn!(
                heart_rate = record.heart_rate,
                breathing_rate = record.breathing_rate,
                "dropping record without usable rates"
            );
            None
        };

        debug!(
            epoch = self.epochs_processed,
            phase = self.onset.phase().as_str(),
            stage = stage.as_str(),
            sleep_score = self.report.sleep_score,
            "epoch processed"
        );

        SessionUpdate {
            epoch_index: self.epochs_processed,
            epoch,
            phase: self.onset.phase(),
            transition: step.reason,
            stage,
            micro_arousal: step.micro_arousal,
            record,
            report: self.report,
        }
    }

    /// Drop all history and return to Monitoring, keeping the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Estimate thresholds over the sleep segment's trailing window, classify the
/// segment and write the results back. Pinned epochs keep their label.
///
/// Returns the stage of the newest epoch.
fn classify_segment(
    history: &mut EpochHistory,
    estimator: &ThresholdEstimator,
    thresholds: &mut SleepThresholds,
    start: usize,
) -> SleepStage {
    let segment = history.epochs_in(start..history.len());
    if let Some(estimated) = estimator.try_estimate(&segment) {
        *thresholds = estimated;
    }
    warn_if_degenerate(thresholds, segment.len());

    let results = StageClassifier::classify(&segment, thresholds);
    for (offset, result) in results.iter().enumerate() {
        history.set_result(start + offset, *result);
    }
    results.last().map(|r| r.stage).unwrap_or_default()
}

/// Run a complete recording through a fresh session, one epoch per
/// `samples_per_epoch` samples. A trailing partial group is ignored.
pub fn replay_samples(samples: &[RadarSample], config: SleepConfig) -> Vec<SessionUpdate> {
    let group = config.sampling.samples_per_epoch.max(1);
    let mut session = SleepSession::new(config);
    samples
        .chunks_exact(group)
        .filter_map(|chunk| session.process_samples(chunk))
        .collect()
}
