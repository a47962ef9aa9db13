//! Epoch history
//!
//! A fixed-capacity, insertion-ordered record of epochs and their stage
//! results. Each slot keeps an epoch and its result together so the two can
//! never fall out of alignment; when the buffer is full the oldest slot is
//! evicted. Slots are addressed by logical index, 0 being the oldest.

use crate::types::{SleepEpoch, SleepStage, SleepStageResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;

/// Default number of epochs retained (about 4.3 hours of 30 s epochs)
pub const DEFAULT_HISTORY_CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Slot {
    epoch: SleepEpoch,
    result: SleepStageResult,
    /// Result was fixed by the session and must not be re-classified
    pinned: bool,
}

/// Bounded history of epochs and stage results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochHistory {
    slots: VecDeque<Slot>,
    capacity: usize,
    /// Total epochs discarded since creation
    evicted: u64,
}

impl Default for EpochHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl EpochHistory {
    /// Create an empty history; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append an epoch, evicting the oldest one if the history is full.
    ///
    /// The new slot starts with an `Unknown` result carrying the epoch's raw
    /// values. Returns the evicted epoch, if any.
    pub fn push(&mut self, epoch: SleepEpoch) -> Option<SleepEpoch> {
        let evicted = if self.slots.len() >= self.capacity {
            self.evicted += 1;
            self.slots.pop_front().map(|slot| slot.epoch)
        } else {
            None
        };

        self.slots.push_back(Slot {
            epoch,
            result: SleepStageResult::labeled(&epoch, SleepStage::Unknown),
            pinned: false,
        });

        evicted
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Number of epochs evicted since the history was created
    pub fn evicted_count(&self) -> u64 {
        self.evicted
    }

    pub fn epoch(&self, index: usize) -> Option<&SleepEpoch> {
        self.slots.get(index).map(|slot| &slot.epoch)
    }

    pub fn result(&self, index: usize) -> Option<&SleepStageResult> {
        self.slots.get(index).map(|slot| &slot.result)
    }

    pub fn latest_epoch(&self) -> Option<&SleepEpoch> {
        self.slots.back().map(|slot| &slot.epoch)
    }

    pub fn latest_result(&self) -> Option<&SleepStageResult> {
        self.slots.back().map(|slot| &slot.result)
    }

    /// Overwrite the result at `index` unless that slot is pinned.
    ///
    /// Returns whether the result was written.
    pub fn set_result(&mut self, index: usize, result: SleepStageResult) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if !slot.pinned => {
                slot.result = result;
                true
            }
            _ => false,
        }
    }

    /// Force a stage on `index` and protect it from later re-classification
    pub fn pin_stage(&mut self, index: usize, stage: SleepStage) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.result.stage = stage;
            slot.pinned = true;
        }
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.pinned)
    }

    /// Label every epoch in `range` with `stage`, clearing pins
    pub fn force_stage(&mut self, range: Range<usize>, stage: SleepStage) {
        let end = range.end.min(self.slots.len());
        for slot in self.slots.range_mut(range.start.min(end)..end) {
            slot.result = SleepStageResult::labeled(&slot.epoch, stage);
            slot.pinned = false;
        }
    }

    /// Copy of the epochs in `range`, oldest first
    pub fn epochs_in(&self, range: Range<usize>) -> Vec<SleepEpoch> {
        let end = range.end.min(self.slots.len());
        self.slots
            .range(range.start.min(end)..end)
            .map(|slot| slot.epoch)
            .collect()
    }

    /// Copy of all epochs, oldest first
    pub fn epochs(&self) -> Vec<SleepEpoch> {
        self.slots.iter().map(|slot| slot.epoch).collect()
    }

    /// Copy of all stage results, index-aligned with `epochs()`
    pub fn results(&self) -> Vec<SleepStageResult> {
        self.slots.iter().map(|slot| slot.result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(marker: f32) -> SleepEpoch {
        SleepEpoch {
            respiratory_rate_bpm: marker,
            motion_index: 0.0,
            heart_rate_mean: 60.0,
            heart_rate_std: 1.0,
            duration_seconds: 30,
        }
    }

    #[test]
    fn test_push_until_full() {
        let mut history = EpochHistory::new(4);
        for i in 0..4 {
            assert!(history.push(epoch(i as f32)).is_none());
        }
        assert!(history.is_full());
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn test_overflow_evicts_oldest_and_keeps_order() {
        let mut history = EpochHistory::new(512);
        for i in 0..513 {
            history.push(epoch(i as f32));
        }

        assert_eq!(history.len(), 512);
        assert_eq!(history.evicted_count(), 1);
        assert_eq!(history.epoch(0).unwrap().respiratory_rate_bpm, 1.0);
        assert_eq!(history.latest_epoch().unwrap().respiratory_rate_bpm, 512.0);
        let markers: Vec<f32> = history.epochs().iter().map(|e| e.respiratory_rate_bpm).collect();
        assert!(markers.windows(2).all(|w| w[1] == w[0] + 1.0));
    }

    #[test]
    fn test_results_stay_aligned_after_eviction() {
        let mut history = EpochHistory::new(3);
        for i in 0..3 {
            history.push(epoch(i as f32));
            history.set_result(i, SleepStageResult::labeled(&epoch(i as f32), SleepStage::Nrem));
        }
        history.push(epoch(3.0));

        let results = history.results();
        let epochs = history.epochs();
        assert_eq!(results.len(), epochs.len());
        for (r, e) in results.iter().zip(epochs.iter()) {
            assert_eq!(r.respiratory_rate_bpm, e.respiratory_rate_bpm);
        }
        assert_eq!(results[2].stage, SleepStage::Unknown);
    }

    #[test]
    fn test_pinned_result_is_not_overwritten() {
        let mut history = EpochHistory::new(4);
        history.push(epoch(1.0));
        history.pin_stage(0, SleepStage::Nrem);

        let written = history.set_result(0, SleepStageResult::labeled(&epoch(1.0), SleepStage::Wake));
        assert!(!written);
        assert_eq!(history.result(0).unwrap().stage, SleepStage::Nrem);

        history.force_stage(0..1, SleepStage::Wake);
        assert!(!history.is_pinned(0));
        assert_eq!(history.result(0).unwrap().stage, SleepStage::Wake);
    }

    #[test]
    fn test_epochs_in_clamps_range() {
        let mut history = EpochHistory::new(8);
        for i in 0..5 {
            history.push(epoch(i as f32));
        }
        assert_eq!(history.epochs_in(3..10).len(), 2);
        assert!(history.epochs_in(7..9).is_empty());
    }
}
