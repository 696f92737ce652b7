// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Opaque ordering token handed back by the sink after each append.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sequence token in the sink's numeric form: a non-empty run of ASCII
/// digits. Real tokens are far wider than 64 bits, so the digits are kept as a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceToken(String);

impl SequenceToken {
    /// Returns `None` unless `raw` is in the sink's expected form.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(SequenceToken(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates local substitute tokens from the wall clock in nanoseconds.
/// Values are strictly increasing even if the clock stalls or steps back.
#[derive(Debug, Default)]
pub struct FallbackTokens {
    last: u128,
}

impl FallbackTokens {
    pub fn next(&mut self) -> SequenceToken {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        SequenceToken(self.last.to_string())
    }

    /// Parses `raw`, substituting a fallback token when it is malformed.
    pub fn parse_or_next(&mut self, raw: &str) -> SequenceToken {
        SequenceToken::parse(raw).unwrap_or_else(|| self.next())
    }
}
