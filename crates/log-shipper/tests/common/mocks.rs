// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stub sink client for exercising the shipper without a network

use async_trait::async_trait;
use log_shipper::token::SequenceToken;
use log_shipper::{CreateOutcome, LogEvent, SinkClient, SinkError, StreamDescription};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SendRecord {
    pub messages: Vec<String>,
    pub timestamps: Vec<i64>,
    pub token: Option<String>,
    pub succeeded: bool,
}

/// Records every call. Optionally fails the first `fail_first` sends, pretends
/// the stream already exists with `existing_token`, and rejects token-less
/// sends against a pre-existing stream. Each send first waits `send_delay`.
#[derive(Default)]
pub struct StubSink {
    pub send_delay: Duration,
    pub fail_first: usize,
    pub existing_token: Option<String>,
    pub stream_exists: bool,
    pub reject_tokenless_on_existing: bool,
    pub next_token: Option<String>,
    pub sends: Mutex<Vec<SendRecord>>,
    pub describe_calls: AtomicUsize,
    pub attempts: AtomicUsize,
    pub closed: AtomicBool,
}

#[allow(dead_code)]
impl StubSink {
    pub fn new() -> Self {
        StubSink::default()
    }

    pub fn failing_first(n: usize) -> Self {
        StubSink {
            fail_first: n,
            ..StubSink::default()
        }
    }

    pub fn with_existing_stream(token: &str) -> Self {
        StubSink {
            stream_exists: true,
            existing_token: Some(token.to_string()),
            reject_tokenless_on_existing: true,
            ..StubSink::default()
        }
    }

    pub fn slow(send_delay: Duration) -> Self {
        StubSink {
            send_delay,
            ..StubSink::default()
        }
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().expect("lock poisoned").clone()
    }

    pub fn successful_sends(&self) -> Vec<SendRecord> {
        self.sends().into_iter().filter(|s| s.succeeded).collect()
    }

    pub fn delivered_messages(&self) -> Vec<String> {
        self.successful_sends()
            .into_iter()
            .flat_map(|s| s.messages)
            .collect()
    }
}

#[async_trait]
impl SinkClient for StubSink {
    async fn create_group(&self, _group: &str) -> CreateOutcome {
        if self.stream_exists {
            CreateOutcome::AlreadyExists
        } else {
            CreateOutcome::Created
        }
    }

    async fn set_retention(&self, _group: &str, _days: u32) -> Result<(), SinkError> {
        Ok(())
    }

    async fn create_stream(&self, _group: &str, _stream: &str) -> CreateOutcome {
        if self.stream_exists {
            CreateOutcome::AlreadyExists
        } else {
            CreateOutcome::Created
        }
    }

    async fn describe_streams(
        &self,
        _group: &str,
        name_prefix: &str,
    ) -> Result<Vec<StreamDescription>, SinkError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![StreamDescription {
            name: name_prefix.to_string(),
            upload_sequence_token: self.existing_token.clone(),
        }])
    }

    async fn send_batch(
        &self,
        _group: &str,
        _stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<String>, SinkError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let result = if attempt < self.fail_first {
            Err(SinkError::Transport("connection reset".to_string()))
        } else if self.reject_tokenless_on_existing && token.is_none() {
            Err(SinkError::rejected(
                "InvalidSequenceTokenException",
                "sequence token required",
            ))
        } else {
            Ok(self.next_token.clone())
        };

        self.sends.lock().expect("lock poisoned").push(SendRecord {
            messages: events.iter().map(LogEvent::message).collect(),
            timestamps: events.iter().map(|e| e.timestamp_millis).collect(),
            token: token.map(ToString::to_string),
            succeeded: result.is_ok(),
        });
        result
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
