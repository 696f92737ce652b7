// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background flush task.
//!
//! Runs on its own tokio task and drains the buffer on a fixed cadence, or
//! immediately when a producer signals that the batch threshold was crossed.
//! Cancelling stops future runs but lets an in-flight send finish.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::shipper::Shipper;

pub struct Scheduler {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Spawns the flush loop on the current tokio runtime.
    pub fn spawn(shipper: Arc<Mutex<Shipper>>, period: Duration, signal: Arc<Notify>) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run(shipper, period, signal, cancel_token.clone()));
        Scheduler {
            cancel_token,
            handle,
        }
    }

    /// Stops scheduling new runs without interrupting one in progress.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Waits up to `timeout` for the loop to exit, then aborts it.
    /// Returns `true` if the loop exited on its own.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.shutdown_by(Instant::now() + timeout).await
    }

    /// Like [`Scheduler::shutdown`], bounded by an absolute `deadline`. An
    /// aborted send puts its batch back in the buffer before this returns.
    pub async fn shutdown_by(mut self, deadline: Instant) -> bool {
        self.cancel();
        match tokio::time::timeout_at(deadline, &mut self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("SHIPPER | Flush task ended abnormally: {e}");
                true
            }
            Err(_) => {
                warn!("SHIPPER | Flush task still running at shutdown deadline, aborting");
                self.handle.abort();
                // Resolves once the task has been dropped.
                let _ = self.handle.await;
                false
            }
        }
    }
}

async fn run(
    shipper: Arc<Mutex<Shipper>>,
    period: Duration,
    signal: Arc<Notify>,
    cancel_token: CancellationToken,
) {
    // First tick lands one full period after start, not immediately.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("SHIPPER | Flush task started, interval {} ms", period.as_millis());

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                shipper.lock().await.flush().await;
            }
            () = signal.notified() => {
                shipper.lock().await.flush().await;
                // The threshold flush already covers this period.
                ticker.reset();
            }
        }
    }

    debug!("SHIPPER | Flush task stopped");
}
