// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers

use log_shipper::{LogEvent, ShipperConfig};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Config pointing nowhere; tests always supply their own sink client.
#[allow(dead_code)]
pub fn test_config(batch_size_threshold: usize, flush_interval_millis: u64) -> ShipperConfig {
    ShipperConfig {
        batch_size_threshold,
        flush_interval_millis,
        shutdown_timeout_millis: 1_000,
        ..ShipperConfig::new("/test/application", "test-host-app")
    }
}

#[allow(dead_code)]
pub fn event(timestamp_millis: i64, message: &str) -> LogEvent {
    LogEvent::new(timestamp_millis, message)
}

/// Polls `condition` every 5ms until it holds or `within` elapses.
#[allow(dead_code)]
pub async fn wait_until(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}
