// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching log shipper for append-only log-aggregation sinks.
//!
//! Host log events are formatted, buffered, and shipped in timestamp order to a
//! remote log group/stream. The pipeline looks like this:
//!
//! ```text
//!   tracing events ──> ShipperLayer ──> Formatter
//!                                          │
//!                                          v
//!   append() ──────────────────────────> Buffer ──(threshold)──┐
//!                                          ^                   │ notify
//!                                 requeue  │                   v
//!                                          │               Scheduler ──(interval)
//!                                          │                   │
//!                                          │                   v
//!                                          └────────────── Shipper ──> SinkClient
//! ```
//!
//! [`LogShipper`] ties the pieces together and owns the start/stop lifecycle.
//! Nothing past [`LogShipper::start`] surfaces errors to the host: failed
//! sends are logged and requeued, and the buffer is bounded so a dead sink
//! cannot grow memory without limit.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod appender;
pub mod bootstrap;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod formatter;
pub mod layer;
pub mod scheduler;
pub mod shipper;
pub mod sink;
pub mod stats;
pub mod token;

pub use appender::{LifecycleState, LogShipper, LogShipperBuilder};
pub use config::ShipperConfig;
pub use error::{ShipperError, SinkError};
pub use event::{LogEvent, LogRecord, StreamIdentity};
pub use formatter::{Formatter, JsonFormatter, PatternFormatter};
pub use layer::ShipperLayer;
pub use shipper::FlushOutcome;
pub use sink::{CreateOutcome, SinkClient, StreamDescription};
