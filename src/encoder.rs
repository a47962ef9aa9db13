//! Snapshot encoding
//!
//! Wraps a session update with producer metadata and the session's current
//! thresholds and onset state, for logging or upload as JSON.

use crate::error::SleepError;
use crate::onset::TransitionReason;
use crate::pipeline::{SessionUpdate, SleepSession};
use crate::types::{
    OnsetPhase, OnsetState, PublishedRecord, SleepQualityReport, SleepStage, SleepThresholds,
};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Full state of a session after one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub producer: SnapshotProducer,
    pub computed_at_utc: String,
    pub epoch_index: u64,
    pub phase: OnsetPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionReason>,
    pub stage: SleepStage,
    pub micro_arousal: bool,
    pub onset: OnsetState,
    pub record: Option<PublishedRecord>,
    pub report: SleepQualityReport,
    pub thresholds: SleepThresholds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_night_report: Option<SleepQualityReport>,
}

/// Encoder producing session snapshots
pub struct SnapshotEncoder {
    instance_id: String,
}

impl Default for SnapshotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, session: &SleepSession, update: &SessionUpdate) -> SessionSnapshot {
        SessionSnapshot {
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            epoch_index: update.epoch_index,
            phase: update.phase,
            transition: update.transition,
            stage: update.stage,
            micro_arousal: update.micro_arousal,
            onset: *session.onset_state(),
            record: update.record,
            report: update.report,
            thresholds: *session.thresholds(),
            last_night_report: session.last_night_report().copied(),
        }
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json(
        &self,
        session: &SleepSession,
        update: &SessionUpdate,
    ) -> Result<String, SleepError> {
        let snapshot = self.encode(session, update);
        serde_json::to_string(&snapshot).map_err(SleepError::Json)
    }
}
