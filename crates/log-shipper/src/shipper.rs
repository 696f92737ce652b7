// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Send protocol: sort, attach the sequence token, append, then either adopt
//! the returned token or requeue the batch.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::buffer::Buffer;
use crate::event::{LogEvent, StreamIdentity};
use crate::sink::SinkClient;
use crate::stats::ShipperStats;
use crate::token::{FallbackTokens, SequenceToken};

/// What a single flush did with the batch it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Sent(usize),
    Requeued(usize),
}

/// Sole owner of the sequence token. Callers serialize access (the lifecycle
/// controller keeps it behind an async mutex), so the token is only ever
/// touched by one send at a time.
pub struct Shipper {
    sink: Arc<dyn SinkClient>,
    identity: StreamIdentity,
    buffer: Arc<Buffer>,
    stats: Arc<ShipperStats>,
    token: Option<SequenceToken>,
    fallback: FallbackTokens,
}

impl Shipper {
    pub fn new(
        sink: Arc<dyn SinkClient>,
        identity: StreamIdentity,
        buffer: Arc<Buffer>,
        stats: Arc<ShipperStats>,
        token: Option<SequenceToken>,
    ) -> Self {
        Shipper {
            sink,
            identity,
            buffer,
            stats,
            token,
            fallback: FallbackTokens::default(),
        }
    }

    pub fn token(&self) -> Option<&SequenceToken> {
        self.token.as_ref()
    }

    /// Drains the buffer and ships whatever it held.
    pub async fn flush(&mut self) -> FlushOutcome {
        let batch = self.buffer.drain();
        self.ship(batch).await
    }

    /// Ships one batch. Never fails: a rejected batch goes back to the head of
    /// the buffer in its original order. The same happens when this future is
    /// dropped before the sink answers, so an aborted send loses nothing.
    pub async fn ship(&mut self, batch: Vec<LogEvent>) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let mut sorted = batch.clone();
        let in_flight = InFlight::new(Arc::clone(&self.buffer), batch);
        sorted.sort_by_key(|e| e.timestamp_millis);

        let count = sorted.len();
        let time = Instant::now();
        let result = self
            .sink
            .send_batch(
                &self.identity.group_name,
                &self.identity.stream_name,
                &sorted,
                self.token.as_ref(),
            )
            .await;

        match result {
            Ok(next) => {
                in_flight.delivered();
                if let Some(raw) = next {
                    let token = self.fallback.parse_or_next(&raw);
                    if token.as_str() != raw.trim() {
                        debug!("SHIPPER | Unparseable sequence token from sink, using local fallback");
                    }
                    self.token = Some(token);
                }
                self.stats.record_sent(count);
                debug!(
                    "SHIPPER | Sent {} log events to {} in {} ms",
                    count,
                    self.identity,
                    time.elapsed().as_millis()
                );
                FlushOutcome::Sent(count)
            }
            Err(e) => {
                self.stats.record_failure();
                error!(
                    "SHIPPER | Failed to send {} log events to {}, requeueing: {}",
                    count, self.identity, e
                );
                drop(in_flight);
                FlushOutcome::Requeued(count)
            }
        }
    }
}

/// A drained batch awaiting the sink's answer. Unless marked delivered it is
/// put back at the head of the buffer when dropped.
struct InFlight {
    buffer: Arc<Buffer>,
    batch: Option<Vec<LogEvent>>,
}

impl InFlight {
    fn new(buffer: Arc<Buffer>, batch: Vec<LogEvent>) -> Self {
        InFlight {
            buffer,
            batch: Some(batch),
        }
    }

    fn delivered(mut self) {
        self.batch = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            self.buffer.requeue(batch);
        }
    }
}
