// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One-time startup procedure: make sure the group and stream exist, and pick
//! up the ordering token of a stream that survived a restart.
//!
//! Every step is best effort. Failures are logged and bootstrap carries on, so
//! a misbehaving sink delays delivery instead of blocking host startup.

use tracing::{debug, error, warn};

use crate::event::StreamIdentity;
use crate::sink::{CreateOutcome, SinkClient};
use crate::token::{FallbackTokens, SequenceToken};

/// What bootstrap found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub group: CreateOutcome,
    pub stream: CreateOutcome,
    pub retention_applied: bool,
    pub recovered_token: Option<SequenceToken>,
}

pub struct Bootstrapper<'a> {
    sink: &'a dyn SinkClient,
    identity: &'a StreamIdentity,
    retention_days: Option<u32>,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(
        sink: &'a dyn SinkClient,
        identity: &'a StreamIdentity,
        retention_days: Option<u32>,
    ) -> Self {
        Bootstrapper {
            sink,
            identity,
            retention_days,
        }
    }

    pub async fn run(&self) -> BootstrapReport {
        let group_name = self.identity.group_name.as_str();
        let stream_name = self.identity.stream_name.as_str();

        let group = self.sink.create_group(group_name).await;
        match &group {
            CreateOutcome::Created => debug!("SHIPPER | Created log group {group_name}"),
            CreateOutcome::AlreadyExists => debug!("SHIPPER | Log group {group_name} already exists"),
            CreateOutcome::Failed(e) => error!("SHIPPER | Failed to create log group {group_name}: {e}"),
        }

        let mut retention_applied = false;
        if let Some(days) = self.retention_days {
            match self.sink.set_retention(group_name, days).await {
                Ok(()) => retention_applied = true,
                Err(e) => warn!(
                    "SHIPPER | Failed to set retention policy of {days} days for log group {group_name}: {e}"
                ),
            }
        }

        let stream = self.sink.create_stream(group_name, stream_name).await;
        let recovered_token = match &stream {
            CreateOutcome::Created => {
                debug!("SHIPPER | Created log stream {}", self.identity);
                None
            }
            CreateOutcome::AlreadyExists => self.recover_token().await,
            CreateOutcome::Failed(e) => {
                error!("SHIPPER | Failed to create log stream {}: {e}", self.identity);
                None
            }
        };

        BootstrapReport {
            group,
            stream,
            retention_applied,
            recovered_token,
        }
    }

    async fn recover_token(&self) -> Option<SequenceToken> {
        let streams = match self
            .sink
            .describe_streams(&self.identity.group_name, &self.identity.stream_name)
            .await
        {
            Ok(streams) => streams,
            Err(e) => {
                warn!(
                    "SHIPPER | Failed to get sequence token for existing log stream {}: {e}",
                    self.identity
                );
                return None;
            }
        };

        // The lookup is by prefix, so only an exact name match counts.
        let raw = streams
            .into_iter()
            .find(|s| s.name == self.identity.stream_name)
            .and_then(|s| s.upload_sequence_token)?;
        let token = FallbackTokens::default().parse_or_next(&raw);
        debug!("SHIPPER | Recovered sequence token for {}", self.identity);
        Some(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::event::LogEvent;
    use crate::sink::StreamDescription;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    struct FakeSink {
        group: CreateOutcome,
        retention: Result<(), SinkError>,
        stream: CreateOutcome,
        streams: Result<Vec<StreamDescription>, SinkError>,
        describe_calls: Mutex<Vec<String>>,
    }

    impl FakeSink {
        fn fresh() -> Self {
            FakeSink {
                group: CreateOutcome::Created,
                retention: Ok(()),
                stream: CreateOutcome::Created,
                streams: Ok(Vec::new()),
                describe_calls: Mutex::new(Vec::new()),
            }
        }

        fn existing(streams: Vec<StreamDescription>) -> Self {
            FakeSink {
                group: CreateOutcome::AlreadyExists,
                stream: CreateOutcome::AlreadyExists,
                streams: Ok(streams),
                ..FakeSink::fresh()
            }
        }
    }

    #[async_trait]
    impl SinkClient for FakeSink {
        async fn create_group(&self, _group: &str) -> CreateOutcome {
            self.group.clone()
        }

        async fn set_retention(&self, _group: &str, _days: u32) -> Result<(), SinkError> {
            self.retention.clone()
        }

        async fn create_stream(&self, _group: &str, _stream: &str) -> CreateOutcome {
            self.stream.clone()
        }

        async fn describe_streams(
            &self,
            _group: &str,
            name_prefix: &str,
        ) -> Result<Vec<StreamDescription>, SinkError> {
            self.describe_calls.lock().unwrap().push(name_prefix.to_string());
            self.streams.clone()
        }

        async fn send_batch(
            &self,
            _group: &str,
            _stream: &str,
            _events: &[LogEvent],
            _token: Option<&SequenceToken>,
        ) -> Result<Option<String>, SinkError> {
            Ok(None)
        }
    }

    fn stream(name: &str, token: Option<&str>) -> StreamDescription {
        StreamDescription {
            name: name.to_string(),
            upload_sequence_token: token.map(str::to_string),
        }
    }

    fn identity() -> StreamIdentity {
        StreamIdentity::new("/app", "host")
    }

    #[tokio::test]
    async fn test_fresh_stream_has_no_token() {
        let sink = FakeSink::fresh();
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, Some(30)).run().await;

        assert_eq!(report.group, CreateOutcome::Created);
        assert_eq!(report.stream, CreateOutcome::Created);
        assert!(report.retention_applied);
        assert_eq!(report.recovered_token, None);
        assert!(sink.describe_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_stream_recovers_exact_match() {
        let sink = FakeSink::existing(vec![
            stream("host-canary", Some("111")),
            stream("host", Some("222")),
        ]);
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, None).run().await;

        assert!(!report.retention_applied);
        assert_eq!(
            report.recovered_token.as_ref().map(SequenceToken::as_str),
            Some("222")
        );
        assert_eq!(*sink.describe_calls.lock().unwrap(), vec!["host".to_string()]);
    }

    #[tokio::test]
    async fn test_existing_stream_without_token() {
        let sink = FakeSink::existing(vec![stream("host", None)]);
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, None).run().await;
        assert_eq!(report.recovered_token, None);
    }

    #[tokio::test]
    async fn test_unparseable_recovered_token_uses_fallback() {
        let sink = FakeSink::existing(vec![stream("host", Some("garbled"))]);
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, None).run().await;

        let token = report.recovered_token.expect("fallback token");
        assert!(SequenceToken::parse(token.as_str()).is_some());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_retention_failure_is_non_fatal() {
        let sink = FakeSink {
            retention: Err(SinkError::rejected("AccessDenied", "nope")),
            ..FakeSink::fresh()
        };
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, Some(30)).run().await;

        assert!(!report.retention_applied);
        assert_eq!(report.stream, CreateOutcome::Created);
        assert!(logs_contain("Failed to set retention policy"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_token_recovery_failure_is_non_fatal() {
        let sink = FakeSink {
            streams: Err(SinkError::Timeout),
            ..FakeSink::existing(Vec::new())
        };
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, None).run().await;

        assert_eq!(report.recovered_token, None);
        assert!(logs_contain("Failed to get sequence token"));
    }

    #[tokio::test]
    async fn test_group_failure_still_creates_stream() {
        let sink = FakeSink {
            group: CreateOutcome::Failed(SinkError::Transport("refused".to_string())),
            ..FakeSink::fresh()
        };
        let identity = identity();
        let report = Bootstrapper::new(&sink, &identity, None).run().await;

        assert!(matches!(report.group, CreateOutcome::Failed(_)));
        assert_eq!(report.stream, CreateOutcome::Created);
    }
}
