// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_APP_NAME, DEFAULT_BATCH_SIZE_THRESHOLD, DEFAULT_FLUSH_INTERVAL_MILLIS,
    DEFAULT_HOSTNAME, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETENTION_DAYS,
    DEFAULT_SHUTDOWN_TIMEOUT_MILLIS,
};
use crate::error::ShipperError;
use crate::event::StreamIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    pub group_name: String,
    pub stream_name: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Buffered events that trigger an immediate flush.
    pub batch_size_threshold: usize,
    /// Interval between background flushes, in milliseconds.
    pub flush_interval_millis: u64,
    /// `None` leaves the group's retention untouched.
    pub retention_days: Option<u32>,
    pub request_timeout_secs: u64,
    /// Total time `stop()` may spend on the final flush and the scheduler.
    pub shutdown_timeout_millis: u64,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        ShipperConfig {
            group_name: String::new(),
            stream_name: String::new(),
            region: None,
            endpoint: None,
            batch_size_threshold: DEFAULT_BATCH_SIZE_THRESHOLD,
            flush_interval_millis: DEFAULT_FLUSH_INTERVAL_MILLIS,
            retention_days: Some(DEFAULT_RETENTION_DAYS),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            shutdown_timeout_millis: DEFAULT_SHUTDOWN_TIMEOUT_MILLIS,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ShipperConfig {
    pub fn new(group_name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        ShipperConfig {
            group_name: group_name.into(),
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Reads `LOG_SHIPPER_*` environment variables on top of the defaults.
    /// Values that fail to parse keep their default.
    pub fn from_env() -> Self {
        let defaults = ShipperConfig::default();

        let stream_name = env_string("LOG_SHIPPER_STREAM").unwrap_or_else(|| {
            let host = env_string("HOSTNAME").unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
            let app = env_string("LOG_SHIPPER_APP_NAME")
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
            format!("{host}-{app}")
        });

        let retention_days = match env_string("LOG_SHIPPER_RETENTION_DAYS") {
            // 0 disables the retention step
            Some(v) => match v.parse::<u32>() {
                Ok(0) => None,
                Ok(days) => Some(days),
                Err(_) => defaults.retention_days,
            },
            None => defaults.retention_days,
        };

        ShipperConfig {
            group_name: env_string("LOG_SHIPPER_GROUP").unwrap_or_default(),
            stream_name,
            region: env_string("LOG_SHIPPER_REGION").or_else(|| env_string("AWS_REGION")),
            endpoint: env_string("LOG_SHIPPER_ENDPOINT"),
            batch_size_threshold: env_parse("LOG_SHIPPER_BATCH_SIZE")
                .unwrap_or(defaults.batch_size_threshold),
            flush_interval_millis: env_parse("LOG_SHIPPER_FLUSH_INTERVAL_MS")
                .unwrap_or(defaults.flush_interval_millis),
            retention_days,
            request_timeout_secs: env_parse("LOG_SHIPPER_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            shutdown_timeout_millis: defaults.shutdown_timeout_millis,
        }
    }

    /// Configuration for a dedicated per-category shipper, e.g. security or
    /// business events, writing to `<group>/<category>` and
    /// `<category>-<stream>`.
    #[must_use]
    pub fn for_category(&self, category: &str) -> Self {
        ShipperConfig {
            group_name: format!("{}/{}", self.group_name, category),
            stream_name: format!("{}-{}", category, self.stream_name),
            ..self.clone()
        }
    }

    /// `require_target` is false when the caller supplies its own sink client.
    pub fn validate(&self, require_target: bool) -> Result<(), ShipperError> {
        if self.group_name.trim().is_empty() {
            return Err(ShipperError::InvalidConfig("group_name is empty".to_string()));
        }
        if self.stream_name.trim().is_empty() {
            return Err(ShipperError::InvalidConfig("stream_name is empty".to_string()));
        }
        if self.batch_size_threshold == 0 {
            return Err(ShipperError::InvalidConfig(
                "batch_size_threshold must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_millis == 0 {
            return Err(ShipperError::InvalidConfig(
                "flush_interval_millis must be greater than 0".to_string(),
            ));
        }
        let has_target = [&self.region, &self.endpoint]
            .iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()));
        if require_target && !has_target {
            return Err(ShipperError::InvalidConfig(
                "either region or endpoint must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn identity(&self) -> StreamIdentity {
        StreamIdentity::new(self.group_name.trim(), self.stream_name.trim())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_millis)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_millis)
    }
}
