// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults for the shipper configuration surface.

/// Buffered events that trigger an immediate flush.
pub const DEFAULT_BATCH_SIZE_THRESHOLD: usize = 100;

/// Cadence of the background flush, in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MILLIS: u64 = 5_000;

/// Retention applied to the log group during bootstrap.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Client-side timeout for each sink request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Total budget for `stop()`, shared by the final flush and the wait for the
/// scheduler. A send still running at the deadline is aborted and its batch
/// stays buffered.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MILLIS: u64 = 5_000;

/// The buffer holds at most this many batches worth of events.
pub const BUFFER_CAPACITY_FACTOR: usize = 2;

pub(crate) const DEFAULT_APP_NAME: &str = "application";
pub(crate) const DEFAULT_HOSTNAME: &str = "localhost";

/// Target prefix of the shipper's own tracing output.
pub(crate) const SELF_TARGET_PREFIX: &str = "log_shipper";
