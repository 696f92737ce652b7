// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A formatted, immutable log event waiting to be shipped.
///
/// The payload is reference counted so a batch can be copied for sorting
/// without duplicating message bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp_millis: i64,
    pub payload: Arc<[u8]>,
}

impl LogEvent {
    pub fn new(timestamp_millis: i64, payload: impl Into<Vec<u8>>) -> Self {
        LogEvent {
            timestamp_millis,
            payload: Arc::from(payload.into()),
        }
    }

    /// Payload decoded as UTF-8 (lossy) with surrounding whitespace trimmed.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).trim().to_string()
    }
}

impl fmt::Debug for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEvent")
            .field("timestamp_millis", &self.timestamp_millis)
            .field("payload", &String::from_utf8_lossy(&self.payload))
            .finish()
    }
}

/// A host log record before formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp_millis: i64,
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub thread_name: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl LogRecord {
    pub fn new(level: tracing::Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp_millis: now_millis(),
            level,
            target: target.into(),
            message: message.into(),
            thread_name: std::thread::current().name().map(str::to_string),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }

    /// Value of the `correlation_id` field, if the host attached one.
    pub fn correlation_id(&self) -> Option<&str> {
        self.fields
            .get("correlation_id")
            .or_else(|| self.fields.get("correlationId"))
            .map(String::as_str)
    }
}

/// Target group and stream for one shipper instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamIdentity {
    pub group_name: String,
    pub stream_name: String,
}

impl StreamIdentity {
    pub fn new(group_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        StreamIdentity {
            group_name: group_name.into(),
            stream_name: stream_name.into(),
        }
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_name, self.stream_name)
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
