// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON-over-HTTP sink client for CloudWatch-Logs-compatible endpoints.
//!
//! Every operation is a `POST /` with an `X-Amz-Target` header naming the
//! action. Requests are not signed; point `endpoint` at a signing proxy or a
//! local emulator when talking to a real service.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::SinkError;
use crate::event::LogEvent;
use crate::sink::{CreateOutcome, SinkClient, StreamDescription};
use crate::token::SequenceToken;

const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";
const ALREADY_EXISTS: &str = "ResourceAlreadyExistsException";

#[derive(Debug, Clone)]
pub struct HttpSinkClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetentionRequest<'a> {
    log_group_name: &'a str,
    retention_in_days: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRequest<'a> {
    log_group_name: &'a str,
    log_stream_name_prefix: &'a str,
}

#[derive(Serialize)]
struct InputLogEvent {
    timestamp: i64,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: Vec<InputLogEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DescribeResponse {
    #[serde(default)]
    log_streams: Vec<LogStream>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogStream {
    log_stream_name: String,
    upload_sequence_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl HttpSinkClient {
    /// Builds a client for `endpoint`, or for the regional service endpoint
    /// when no explicit endpoint is given.
    pub fn new(
        region: Option<&str>,
        endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let endpoint = match (endpoint, region) {
            (Some(endpoint), _) if !endpoint.trim().is_empty() => {
                endpoint.trim().trim_end_matches('/').to_string()
            }
            (_, Some(region)) if !region.trim().is_empty() => {
                format!("https://logs.{}.amazonaws.com", region.trim())
            }
            _ => {
                return Err(SinkError::Transport(
                    "neither endpoint nor region configured".to_string(),
                ))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SinkError::from)?;

        Ok(HttpSinkClient { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<B: Serialize>(&self, action: &str, body: &B) -> Result<Vec<u8>, SinkError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| SinkError::Transport(format!("failed to encode {action}: {e}")))?;
        let resp = self
            .client
            .post(format!("{}/", self.endpoint))
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if status.is_success() {
            return Ok(bytes.to_vec());
        }

        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        // Types may be namespaced, e.g. "com.amazonaws.logs#ResourceAlreadyExistsException".
        let code = body
            .error_type
            .rsplit('#')
            .next()
            .filter(|code| !code.is_empty())
            .map_or_else(|| status.as_u16().to_string(), str::to_string);
        debug!("SHIPPER | {action} returned {status}: {code}");
        Err(SinkError::rejected(code, body.message))
    }

    async fn create(&self, action: &str, body: &impl Serialize) -> CreateOutcome {
        match self.call(action, body).await {
            Ok(_) => CreateOutcome::Created,
            Err(SinkError::Rejected { code, .. }) if code == ALREADY_EXISTS => {
                CreateOutcome::AlreadyExists
            }
            Err(e) => CreateOutcome::Failed(e),
        }
    }
}

/// Pulls the next token out of an accepted `PutLogEvents` reply. The batch is
/// already stored at this point, so a malformed reply still counts as success
/// and anything unusable is left to the caller's token fallback.
fn next_sequence_token(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<PutLogEventsResponse>(bytes) {
        Ok(resp) => match resp.next_sequence_token? {
            serde_json::Value::Null => None,
            serde_json::Value::String(token) => Some(token),
            other => Some(other.to_string()),
        },
        Err(e) => {
            debug!("SHIPPER | Undecodable PutLogEvents reply: {e}");
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn decode<T: Default + for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, SinkError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| SinkError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl SinkClient for HttpSinkClient {
    async fn create_group(&self, group: &str) -> CreateOutcome {
        self.create("CreateLogGroup", &GroupRequest { log_group_name: group })
            .await
    }

    async fn set_retention(&self, group: &str, days: u32) -> Result<(), SinkError> {
        self.call(
            "PutRetentionPolicy",
            &RetentionRequest {
                log_group_name: group,
                retention_in_days: days,
            },
        )
        .await
        .map(|_| ())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> CreateOutcome {
        self.create(
            "CreateLogStream",
            &StreamRequest {
                log_group_name: group,
                log_stream_name: stream,
            },
        )
        .await
    }

    async fn describe_streams(
        &self,
        group: &str,
        name_prefix: &str,
    ) -> Result<Vec<StreamDescription>, SinkError> {
        let bytes = self
            .call(
                "DescribeLogStreams",
                &DescribeRequest {
                    log_group_name: group,
                    log_stream_name_prefix: name_prefix,
                },
            )
            .await?;
        let resp: DescribeResponse = decode(&bytes)?;
        Ok(resp
            .log_streams
            .into_iter()
            .map(|s| StreamDescription {
                name: s.log_stream_name,
                upload_sequence_token: s.upload_sequence_token,
            })
            .collect())
    }

    async fn send_batch(
        &self,
        group: &str,
        stream: &str,
        events: &[LogEvent],
        token: Option<&SequenceToken>,
    ) -> Result<Option<String>, SinkError> {
        let request = PutLogEventsRequest {
            log_group_name: group,
            log_stream_name: stream,
            log_events: events
                .iter()
                .map(|e| InputLogEvent {
                    timestamp: e.timestamp_millis,
                    message: e.message(),
                })
                .collect(),
            sequence_token: token.map(SequenceToken::as_str),
        };
        let bytes = self.call("PutLogEvents", &request).await?;
        Ok(next_sequence_token(&bytes))
    }
}
