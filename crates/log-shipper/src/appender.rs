// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle controller.
//!
//! [`LogShipper`] is the handle hosts hold on to. It acquires the sink client,
//! bootstraps the stream and arms the scheduler in [`LogShipper::start`], and
//! releases all of it again in [`LogShipper::stop`]. Between the two, producers
//! call [`LogShipper::append`] from any thread.
//!
//! ```text
//! Stopped ──start()──> Starting ──> Started ──stop()──> Stopping ──> Stopped
//!    ^                    │
//!    └──── start error ───┘
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::{Mutex as TokioMutex, Notify};
use tracing::{debug, error, info, warn};

use crate::bootstrap::Bootstrapper;
use crate::buffer::Buffer;
use crate::config::ShipperConfig;
use crate::error::ShipperError;
use crate::event::{LogEvent, LogRecord};
use crate::formatter::Formatter;
use crate::layer::ShipperLayer;
use crate::scheduler::Scheduler;
use crate::shipper::{FlushOutcome, Shipper};
use crate::sink::{HttpSinkClient, SinkClient};
use crate::stats::{ShipperStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

/// Resources acquired by `start()` and released by `stop()`.
struct Running {
    scheduler: Scheduler,
    shipper: Arc<TokioMutex<Shipper>>,
    sink: Arc<dyn SinkClient>,
}

struct Inner {
    config: ShipperConfig,
    formatter: Option<Arc<dyn Formatter>>,
    supplied_sink: Option<Arc<dyn SinkClient>>,
    state: RwLock<LifecycleState>,
    buffer: Arc<Buffer>,
    stats: Arc<ShipperStats>,
    flush_signal: Arc<Notify>,
    running: TokioMutex<Option<Running>>,
}

#[derive(Default)]
pub struct LogShipperBuilder {
    config: ShipperConfig,
    formatter: Option<Arc<dyn Formatter>>,
    sink: Option<Arc<dyn SinkClient>>,
}

impl LogShipperBuilder {
    pub fn new(config: ShipperConfig) -> Self {
        LogShipperBuilder {
            config,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Uses an externally constructed sink client instead of building an
    /// [`HttpSinkClient`] from the configured region or endpoint.
    #[must_use]
    pub fn sink_client(mut self, sink: Arc<dyn SinkClient>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> LogShipper {
        let buffer = Arc::new(Buffer::new(self.config.batch_size_threshold));
        LogShipper {
            inner: Arc::new(Inner {
                config: self.config,
                formatter: self.formatter,
                supplied_sink: self.sink,
                state: RwLock::new(LifecycleState::Stopped),
                buffer,
                stats: Arc::new(ShipperStats::default()),
                flush_signal: Arc::new(Notify::new()),
                running: TokioMutex::new(None),
            }),
        }
    }
}

/// Cloneable handle to one shipper instance.
#[derive(Clone)]
pub struct LogShipper {
    inner: Arc<Inner>,
}

impl fmt::Debug for LogShipper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogShipper")
            .field("identity", &self.inner.config.identity())
            .field("state", &self.state())
            .field("buffered", &self.inner.buffer.len())
            .finish()
    }
}

impl LogShipper {
    pub fn builder(config: ShipperConfig) -> LogShipperBuilder {
        LogShipperBuilder::new(config)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LifecycleState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LifecycleState) {
        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn state(&self) -> LifecycleState {
        *self.read_state()
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.inner.config
    }

    /// Events currently waiting in the buffer.
    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot(self.inner.buffer.dropped())
    }

    /// A `tracing-subscriber` layer that feeds host events into this shipper.
    pub fn layer(&self) -> ShipperLayer {
        ShipperLayer::new(self.clone())
    }

    /// Acquires the sink client, bootstraps the target stream and arms the
    /// background flush.
    ///
    /// Only configuration problems are reported. Bootstrap failures against
    /// the sink are logged and startup continues.
    pub async fn start(&self) -> Result<(), ShipperError> {
        let mut running = self.inner.running.lock().await;
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state != LifecycleState::Stopped {
                return Err(ShipperError::AlreadyStarted);
            }
            *state = LifecycleState::Starting;
        }

        match self.acquire().await {
            Ok(resources) => {
                *running = Some(resources);
                self.set_state(LifecycleState::Started);
                info!(
                    "SHIPPER | Started log shipper for {}",
                    self.inner.config.identity()
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                error!("SHIPPER | Failed to start log shipper: {e}");
                Err(e)
            }
        }
    }

    async fn acquire(&self) -> Result<Running, ShipperError> {
        let config = &self.inner.config;
        if self.inner.formatter.is_none() {
            return Err(ShipperError::MissingFormatter);
        }
        config.validate(self.inner.supplied_sink.is_none())?;

        let sink: Arc<dyn SinkClient> = match &self.inner.supplied_sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(
                HttpSinkClient::new(
                    config.region.as_deref(),
                    config.endpoint.as_deref(),
                    config.request_timeout(),
                )
                .map_err(|e| ShipperError::SinkInit(e.to_string()))?,
            ),
        };

        let identity = config.identity();
        let report = Bootstrapper::new(sink.as_ref(), &identity, config.retention_days)
            .run()
            .await;
        debug!("SHIPPER | Bootstrap finished: {report:?}");

        let shipper = Arc::new(TokioMutex::new(Shipper::new(
            Arc::clone(&sink),
            identity,
            Arc::clone(&self.inner.buffer),
            Arc::clone(&self.inner.stats),
            report.recovered_token,
        )));
        let scheduler = Scheduler::spawn(
            Arc::clone(&shipper),
            config.flush_interval(),
            Arc::clone(&self.inner.flush_signal),
        );

        Ok(Running {
            scheduler,
            shipper,
            sink,
        })
    }

    /// Buffers a pre-formatted event. Dropped silently unless started.
    ///
    /// Never blocks on I/O: crossing the batch threshold wakes the background
    /// flush instead of sending on the caller's thread.
    pub fn append(&self, event: LogEvent) {
        // The read guard is held across the push so `stop()` cannot slip its
        // final drain in between the state check and the push.
        let state = self.read_state();
        if *state != LifecycleState::Started {
            return;
        }
        if self.inner.buffer.append(event) {
            self.inner.flush_signal.notify_one();
        }
        drop(state);
    }

    /// Formats `record` with the configured formatter and buffers it.
    pub fn append_record(&self, record: &LogRecord) {
        let Some(formatter) = &self.inner.formatter else {
            return;
        };
        if !self.is_started() {
            return;
        }
        let payload = formatter.format(record);
        self.append(LogEvent::new(record.timestamp_millis, payload));
    }

    /// Drains and ships the buffer now. Returns [`FlushOutcome::Empty`] when
    /// not started.
    pub async fn flush(&self) -> FlushOutcome {
        let shipper = match self.inner.running.lock().await.as_ref() {
            Some(running) => Arc::clone(&running.shipper),
            None => return FlushOutcome::Empty,
        };
        let outcome = shipper.lock().await.flush().await;
        outcome
    }

    /// Cancels the background flush, ships what is left, and releases the
    /// scheduler and the sink client. Never fails.
    pub async fn stop(&self) {
        let mut running = self.inner.running.lock().await;
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state != LifecycleState::Started {
                return;
            }
            *state = LifecycleState::Stopping;
        }

        if let Some(Running {
            scheduler,
            shipper,
            sink,
        }) = running.take()
        {
            let timeout = self.inner.config.shutdown_timeout();
            // The final flush and the scheduler wait share one budget.
            let deadline = tokio::time::Instant::now() + timeout;
            scheduler.cancel();

            // Run on its own task so a panicking sink is caught as a JoinError.
            let mut final_flush = tokio::spawn(async move {
                let outcome = shipper.lock().await.flush().await;
                outcome
            });
            match tokio::time::timeout_at(deadline, &mut final_flush).await {
                Ok(Ok(outcome)) => debug!("SHIPPER | Final flush: {outcome:?}"),
                Ok(Err(e)) => error!("SHIPPER | Final flush failed: {e}"),
                Err(_) => {
                    warn!(
                        "SHIPPER | Final flush did not finish within {} ms",
                        timeout.as_millis()
                    );
                    final_flush.abort();
                    // The aborted send requeues its batch when dropped.
                    let _ = final_flush.await;
                }
            }

            scheduler.shutdown_by(deadline).await;
            sink.close().await;
        }

        let remaining = self.inner.buffer.len();
        if remaining > 0 {
            warn!("SHIPPER | Stopped with {remaining} unsent log events buffered");
        }
        self.set_state(LifecycleState::Stopped);
        info!("SHIPPER | Stopped log shipper for {}", self.inner.config.identity());
    }
}
