//! Shared buffers between ingestion, the periodic pipeline and the uploader
//!
//! Both buffers are bounded and never block their producer: the sample ring
//! overwrites its oldest sample and the record queue drops its oldest record.
//! They are meant to be wrapped in an `Arc` and shared across tasks.

use crate::types::RadarSample;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::warn;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking writer cannot leave the buffers half-updated
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fixed-capacity ring of raw samples for the epoch being assembled
pub struct SampleRing {
    samples: Mutex<HeapRb<RadarSample>>,
    capacity: usize,
}

impl std::fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRing")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl SampleRing {
    /// Create a ring holding one epoch of samples; zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(HeapRb::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.samples).occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.samples).is_empty()
    }

    /// Store a sample, overwriting the oldest when full.
    ///
    /// Returns `true` if a sample was overwritten.
    pub fn push(&self, sample: RadarSample) -> bool {
        lock(&self.samples).push_overwrite(sample).is_some()
    }

    /// Drain the ring if it holds a full epoch, otherwise leave it untouched.
    ///
    /// Uses `try_lock`, so a pass that races with ingestion is skipped rather
    /// than blocked.
    pub fn take_if_full(&self) -> Option<Vec<RadarSample>> {
        let mut samples = match self.samples.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        if samples.occupied_len() < self.capacity {
            return None;
        }
        Some(samples.pop_iter().collect())
    }
}

/// Bounded FIFO that drops its oldest item instead of blocking the producer
#[derive(Debug)]
pub struct RecordQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> RecordQueue<T> {
    /// Create a queue; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }

    /// Records discarded because the consumer fell behind
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Enqueue an item, returning the oldest one if it had to be dropped
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = lock(&self.items);
        let dropped = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        drop(items);

        if dropped.is_some() {
            let total_dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                capacity = self.capacity,
                total_dropped,
                "record queue full, dropped oldest record"
            );
        }
        dropped
    }

    pub fn pop(&self) -> Option<T> {
        lock(&self.items).pop_front()
    }

    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> Vec<T> {
        lock(&self.items).drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sample(marker: u8) -> RadarSample {
        RadarSample::new(60 + marker, 14, marker)
    }

    #[test]
    fn test_ring_skips_until_full() {
        let ring = SampleRing::new(3);
        ring.push(sample(1));
        ring.push(sample(2));
        assert!(ring.take_if_full().is_none());
        // A skipped pass leaves the samples in place
        assert_eq!(ring.len(), 2);

        ring.push(sample(3));
        let taken = ring.take_if_full().unwrap();
        assert_eq!(taken.len(), 3);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let ring = SampleRing::new(3);
        for i in 1..=3 {
            assert!(!ring.push(sample(i)));
        }
        assert!(ring.push(sample(4)));

        let markers: Vec<u8> = ring
            .take_if_full()
            .unwrap()
            .iter()
            .map(|s| s.motion_level)
            .collect();
        assert_eq!(markers, vec![2, 3, 4]);
    }

    #[test]
    fn test_ring_shared_across_threads() {
        let ring = Arc::new(SampleRing::new(100));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        ring.push(sample(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ring.take_if_full().map(|s| s.len()), Some(100));
    }

    #[test]
    fn test_take_skips_while_ingestion_holds_lock() {
        use std::sync::mpsc;

        let ring = Arc::new(SampleRing::new(3));
        for i in 1..=3 {
            ring.push(sample(i));
        }

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let _guard = ring.samples.lock().unwrap();
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let started = std::time::Instant::now();
        assert!(ring.take_if_full().is_none());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.take_if_full().map(|s| s.len()), Some(3));
    }

    #[test]
    fn test_queue_drops_oldest() {
        let queue = RecordQueue::new(2);
        assert_eq!(queue.push(1), None);
        assert_eq!(queue.push(2), None);
        assert_eq!(queue.push(3), Some(1));
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.drain(), vec![2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_pop_order() {
        let queue = RecordQueue::new(4);
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.len(), 1);
    }
}
