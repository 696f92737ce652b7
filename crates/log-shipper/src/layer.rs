// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing-subscriber` integration.
//!
//! ```rust,ignore
//! use tracing_subscriber::prelude::*;
//!
//! let shipper = LogShipper::builder(ShipperConfig::from_env())
//!     .formatter(JsonFormatter)
//!     .build();
//! shipper.start().await?;
//! tracing_subscriber::registry().with(shipper.layer()).init();
//! ```

use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::appender::LogShipper;
use crate::constants::SELF_TARGET_PREFIX;
use crate::event::{now_millis, LogRecord};

// Events from these crates are emitted while shipping and would loop back
// into the buffer.
const IGNORED_TARGETS: [&str; 9] = [
    SELF_TARGET_PREFIX,
    "reqwest",
    "hyper",
    "hyper_util",
    "h2",
    "rustls",
    "tokio",
    "mio",
    "tower",
];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| {
        target == *prefix
            || target
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

/// Forwards host `tracing` events at or above `max_level` to a [`LogShipper`].
#[derive(Debug, Clone)]
pub struct ShipperLayer {
    shipper: LogShipper,
    max_level: Level,
}

impl ShipperLayer {
    pub fn new(shipper: LogShipper) -> Self {
        ShipperLayer {
            shipper,
            max_level: Level::INFO,
        }
    }

    /// Most verbose level forwarded. Defaults to `INFO`.
    #[must_use]
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for ShipperLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level
            || is_ignored(metadata.target())
            || !self.shipper.is_started()
        {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp_millis: now_millis(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            thread_name: std::thread::current().name().map(str::to_string),
            fields: visitor.fields,
        };
        self.shipper.append_record(&record);
    }
}
