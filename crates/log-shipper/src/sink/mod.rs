// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote log sink as consumed by the shipper.

pub mod http;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::event::LogEvent;
use crate::token::SequenceToken;

pub use http::HttpSinkClient;

/// Result of a create call. An existing resource is an expected outcome, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    Failed(SinkError),
}

/// One stream returned by [`SinkClient::describe_streams`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescription {
    pub name: String,
    pub upload_sequence_token: Option<String>,
}

#[async_trait]
pub trait SinkClient: Send + Sync {
    async fn create_group(&self, group: &str) -> CreateOutcome;

    async fn set_retention(&self, group: &str, days: u32) -> Result<(), SinkError>;

    async fn create_stream(&self, group: &str, stream: &str) -> CreateOutcome;

    /// Lists the streams in `group` whose name starts with `name_prefix`.
    async fn describe_streams(
        &self,
        group: &str,
        name_prefix: &str,
    ) -> Result<Vec<StreamDescription>, SinkError>;

    /// Appends `events`, which are sorted by timestamp, and returns the token
    /// for the next append when the sink supplies one.
    async fn send_batch(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<String>, SinkError>;

    /// Releases client resources. Called once when the shipper stops.
    async fn close(&self) {}
}
