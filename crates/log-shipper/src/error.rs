// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced by [`crate::LogShipper::start`]. Nothing else in the crate
/// returns an error to the host.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("No formatter configured for the log shipper")]
    MissingFormatter,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize sink client: {0}")]
    SinkInit(String),

    #[error("Log shipper already started")]
    AlreadyStarted,
}

/// Failure reported by a [`crate::SinkClient`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rejected by sink ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("invalid sink response: {0}")]
    InvalidResponse(String),
}

impl SinkError {
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        SinkError::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SinkError::Timeout
        } else if err.is_decode() {
            SinkError::InvalidResponse(err.to_string())
        } else {
            SinkError::Transport(err.to_string())
        }
    }
}
