// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns host log records into event payloads.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::event::LogRecord;

pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Vec<u8>;
}

impl<F> Formatter for F
where
    F: Fn(&LogRecord) -> Vec<u8> + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> Vec<u8> {
        self(record)
    }
}

/// Plain-text line formatter:
///
/// ```text
/// 2024-03-01 12:30:45.123 [worker-1] INFO  [req-42] checkout::api - order placed
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternFormatter;

impl Formatter for PatternFormatter {
    fn format(&self, record: &LogRecord) -> Vec<u8> {
        let mut line = format!(
            "{} [{}] {:<5} [{}] {} - {}",
            format_timestamp(record.timestamp_millis),
            record.thread_name.as_deref().unwrap_or("-"),
            record.level.as_str(),
            record.correlation_id().unwrap_or(""),
            record.target,
            record.message,
        );
        for (key, value) in &record.fields {
            if key != "correlation_id" && key != "correlationId" {
                line.push_str(&format!(" {key}={value}"));
            }
        }
        line.into_bytes()
    }
}

/// One JSON object per record, with fields nested under `fields`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Vec<u8> {
        let mut object = Map::new();
        object.insert(
            "timestamp".to_string(),
            Value::String(format_timestamp(record.timestamp_millis)),
        );
        object.insert("level".to_string(), Value::String(record.level.as_str().to_string()));
        object.insert("logger".to_string(), Value::String(record.target.clone()));
        if let Some(thread) = &record.thread_name {
            object.insert("thread".to_string(), Value::String(thread.clone()));
        }
        object.insert("message".to_string(), Value::String(record.message.clone()));
        if let Some(id) = record.correlation_id() {
            object.insert("correlationId".to_string(), Value::String(id.to_string()));
        }
        if !record.fields.is_empty() {
            let fields = record
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            object.insert("fields".to_string(), Value::Object(fields));
        }
        Value::Object(object).to_string().into_bytes()
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
