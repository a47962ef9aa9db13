//! Sleep Radar - sleep staging from contactless radar vital signs
//!
//! Turns a stream of heart-rate, respiration and body-movement readings from
//! a millimetre-wave radar into per-epoch sleep stages and a nightly quality
//! score through a deterministic pipeline: sample aggregation → onset
//! detection → adaptive thresholds → stage classification → quality scoring.
//!
//! ## Modules
//!
//! - **Staging core**: `aggregator`, `thresholds`, `classifier`, `quality`
//! - **Session**: `history`, `onset`, `pipeline` (one `SleepSession` per night)
//! - **Device I/O**: `protocol` (sensor frame codec), `ingest` (shared buffers)

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod history;
pub mod ingest;
pub mod onset;
pub mod pipeline;
pub mod protocol;
pub mod quality;
pub mod stats;
pub mod thresholds;
pub mod types;

pub use aggregator::EpochAggregator;
pub use classifier::StageClassifier;
pub use config::SleepConfig;
pub use encoder::{SessionSnapshot, SnapshotEncoder};
pub use error::{FrameError, SleepError};
pub use history::EpochHistory;
pub use ingest::{RecordQueue, SampleRing};
pub use onset::{OnsetDetector, TransitionReason};
pub use pipeline::{replay_samples, SessionUpdate, SleepSession};
pub use quality::QualityScorer;
pub use thresholds::ThresholdEstimator;
pub use types::{
    OnsetPhase, PublishedRecord, RadarSample, SleepEpoch, SleepQualityReport, SleepStage,
    SleepStageResult, SleepThresholds,
};

/// Engine version embedded in snapshots
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshots
pub const PRODUCER_NAME: &str = "sleep-radar";
