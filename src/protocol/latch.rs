//! Sample latch
//!
//! The sensor reports each vital on its own schedule. The latch remembers
//! the latest heart rate, respiration and body movement and snapshots them
//! into a `RadarSample` whenever the sample cadence fires.

use super::reading::SensorReading;
use crate::types::{RadarSample, MOTION_LEVEL_MAX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest value of each vital channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLatch {
    heart_rate_bpm: u8,
    respiratory_rate_bpm: u8,
    motion_level: u8,
    readings: u64,
}

impl SampleLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a reading into the latch; returns whether it touched a vital
    pub fn apply(&mut self, reading: &SensorReading) -> bool {
        match reading {
            SensorReading::HeartRate { bpm } => self.heart_rate_bpm = *bpm,
            SensorReading::Respiration { bpm } => self.respiratory_rate_bpm = *bpm,
            SensorReading::BodyMovement { level } => {
                self.motion_level = (*level).min(MOTION_LEVEL_MAX)
            }
            _ => return false,
        }
        self.readings += 1;
        true
    }

    /// Whether any vital has been seen yet
    pub fn is_primed(&self) -> bool {
        self.readings > 0
    }

    /// Snapshot the current values
    pub fn sample_at(&self, timestamp: DateTime<Utc>) -> RadarSample {
        RadarSample {
            heart_rate_bpm: self.heart_rate_bpm,
            respiratory_rate_bpm: self.respiratory_rate_bpm,
            motion_level: self.motion_level,
            timestamp,
        }
    }

    pub fn sample(&self) -> RadarSample {
        self.sample_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MotionState;

    #[test]
    fn test_latch_keeps_latest_values() {
        let mut latch = SampleLatch::new();
        assert!(!latch.is_primed());

        latch.apply(&SensorReading::HeartRate { bpm: 70 });
        latch.apply(&SensorReading::HeartRate { bpm: 64 });
        latch.apply(&SensorReading::Respiration { bpm: 13 });
        assert!(!latch.apply(&SensorReading::Motion {
            state: MotionState::Still
        }));

        let sample = latch.sample();
        assert!(latch.is_primed());
        assert_eq!(sample.heart_rate_bpm, 64);
        assert_eq!(sample.respiratory_rate_bpm, 13);
        assert_eq!(sample.motion_level, 0);
    }

    #[test]
    fn test_body_movement_is_clamped() {
        let mut latch = SampleLatch::new();
        latch.apply(&SensorReading::BodyMovement { level: 180 });
        assert_eq!(latch.sample().motion_level, MOTION_LEVEL_MAX);
    }
}
