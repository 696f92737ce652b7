// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters updated by the shipper.
#[derive(Debug, Default)]
pub struct ShipperStats {
    sent_events: AtomicU64,
    sent_batches: AtomicU64,
    failed_sends: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent_events: u64,
    pub sent_batches: u64,
    pub failed_sends: u64,
    /// Events evicted because the buffer bound was exceeded.
    pub dropped_events: u64,
}

impl ShipperStats {
    pub(crate) fn record_sent(&self, events: usize) {
        self.sent_events.fetch_add(events as u64, Ordering::Relaxed);
        self.sent_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, dropped_events: u64) -> StatsSnapshot {
        StatsSnapshot {
            sent_events: self.sent_events.load(Ordering::Relaxed),
            sent_batches: self.sent_batches.load(Ordering::Relaxed),
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
            dropped_events,
        }
    }
}
