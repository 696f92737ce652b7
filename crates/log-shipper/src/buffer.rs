// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded, insertion-ordered holding area for events awaiting shipment.
//!
//! Producers append at the tail, the flush path drains everything at once, and
//! failed batches are requeued at the head. The buffer never holds more than
//! `capacity` events: when a push would exceed it, the oldest events are
//! dropped and counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::constants::BUFFER_CAPACITY_FACTOR;
use crate::event::LogEvent;

#[derive(Debug)]
pub struct Buffer {
    events: Mutex<VecDeque<LogEvent>>,
    threshold: usize,
    capacity: usize,
    dropped: AtomicU64,
}

impl Buffer {
    /// Creates a buffer that signals a flush at `threshold` events and holds at
    /// most `2 × threshold`.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Buffer {
            events: Mutex::new(VecDeque::with_capacity(threshold)),
            threshold,
            capacity: threshold.saturating_mul(BUFFER_CAPACITY_FACTOR),
            dropped: AtomicU64::new(0),
        }
    }

    // A panic while holding the lock cannot leave the deque half-modified, so
    // a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `event` at the tail.
    ///
    /// Returns `true` when this append moved the buffer from below the
    /// threshold to at-or-above it, meaning the caller should trigger a flush.
    pub fn append(&self, event: LogEvent) -> bool {
        let mut events = self.lock();
        let before = events.len();
        if before >= self.capacity {
            events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                "SHIPPER | Buffer full ({} events), dropping oldest log event",
                self.capacity
            );
        }
        events.push_back(event);
        before < self.threshold && events.len() >= self.threshold
    }

    /// Atomically empties the buffer and returns its contents in insertion order.
    pub fn drain(&self) -> Vec<LogEvent> {
        let mut events = self.lock();
        std::mem::take(&mut *events).into()
    }

    /// Puts a failed batch back at the head, preserving its relative order.
    ///
    /// Returns how many events were dropped from the oldest end to stay within
    /// capacity.
    pub fn requeue(&self, batch: Vec<LogEvent>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let mut events = self.lock();
        let newer = std::mem::take(&mut *events);
        let mut merged: VecDeque<LogEvent> = batch.into();
        merged.extend(newer);

        let excess = merged.len().saturating_sub(self.capacity);
        if excess > 0 {
            merged.drain(..excess);
            self.dropped.fetch_add(excess as u64, Ordering::Relaxed);
            warn!(
                "SHIPPER | Buffer bound of {} exceeded on requeue, dropped {} oldest log events",
                self.capacity, excess
            );
        }
        *events = merged;
        excess
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events dropped because the bound was exceeded.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn event(n: i64) -> LogEvent {
        LogEvent::new(n, format!("event-{n}"))
    }

    fn timestamps(events: &[LogEvent]) -> Vec<i64> {
        events.iter().map(|e| e.timestamp_millis).collect()
    }

    #[test]
    fn test_append_signals_once_per_crossing() {
        let buffer = Buffer::new(3);
        assert!(!buffer.append(event(1)));
        assert!(!buffer.append(event(2)));
        assert!(buffer.append(event(3)));
        assert!(!buffer.append(event(4)));
        assert_eq!(buffer.len(), 4);

        buffer.drain();
        assert!(!buffer.append(event(5)));
        assert!(!buffer.append(event(6)));
        assert!(buffer.append(event(7)));
    }

    #[test]
    fn test_drain_empties_in_insertion_order() {
        let buffer = Buffer::new(10);
        for n in [5, 1, 3] {
            buffer.append(event(n));
        }
        assert_eq!(timestamps(&buffer.drain()), vec![5, 1, 3]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_append_evicts_oldest_at_capacity() {
        let buffer = Buffer::new(2);
        for n in 1..=6 {
            buffer.append(event(n));
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.dropped(), 2);
        assert_eq!(timestamps(&buffer.drain()), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_requeue_goes_to_head() {
        let buffer = Buffer::new(5);
        buffer.append(event(1));
        buffer.append(event(2));
        let failed = buffer.drain();
        buffer.append(event(3));

        assert_eq!(buffer.requeue(failed), 0);
        assert_eq!(timestamps(&buffer.drain()), vec![1, 2, 3]);
    }

    #[test]
    fn test_requeue_drops_oldest_excess() {
        let buffer = Buffer::new(2);
        let failed = vec![event(1), event(2), event(3)];
        buffer.append(event(4));
        buffer.append(event(5));

        assert_eq!(buffer.requeue(failed), 1);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(timestamps(&buffer.drain()), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_requeue_empty_is_noop() {
        let buffer = Buffer::new(2);
        buffer.append(event(1));
        assert_eq!(buffer.requeue(Vec::new()), 0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        let buffer = Buffer::new(0);
        assert_eq!(buffer.threshold(), 1);
        assert_eq!(buffer.capacity(), 2);
        assert!(buffer.append(event(1)));
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let buffer = Arc::new(Buffer::new(1_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        buffer.append(event(t * 1_000 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.drain().len(), 400);
        assert_eq!(buffer.dropped(), 0);
    }

    proptest! {
        // Every appended event is either drained exactly once or counted as dropped,
        // across any interleaving of appends, drains, and failed-batch requeues.
        #[test]
        fn prop_events_are_conserved(ops in proptest::collection::vec(0u8..3, 1..200), threshold in 1usize..8) {
            let buffer = Buffer::new(threshold);
            let mut next = 0i64;
            let mut delivered = Vec::new();
            for op in ops {
                match op {
                    0 => { buffer.append(event(next)); next += 1; }
                    1 => delivered.extend(buffer.drain()),
                    _ => { let batch = buffer.drain(); buffer.requeue(batch); }
                }
                prop_assert!(buffer.len() <= buffer.capacity());
            }
            delivered.extend(buffer.drain());

            let mut seen = timestamps(&delivered);
            let total = seen.len() as u64 + buffer.dropped();
            prop_assert_eq!(total, next as u64);
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), delivered.len());
        }
    }
}
