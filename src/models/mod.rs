pub mod plan;
pub mod snapshot;
pub mod window;

pub use plan::*;
pub use snapshot::*;
pub use window::*;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Length of a session window. The same figure is the idle gap that closes a
/// window early and the minimum inactivity recorded as a gap window.
pub const SESSION_DURATION_HOURS: i64 = 5;

/// Tag used for events that carry no model identifier
pub const UNKNOWN_MODEL: &str = "unknown";

pub fn session_duration() -> Duration {
    Duration::hours(SESSION_DURATION_HOURS)
}

/// Model identifier attached to a usage event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    Known(String),
    Unknown,
}

impl ModelId {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            ModelId::Unknown
        } else {
            ModelId::Known(name)
        }
    }

    pub fn from_option(name: Option<String>) -> Self {
        name.map(Self::new).unwrap_or(ModelId::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModelId::Known(name) => name,
            ModelId::Unknown => UNKNOWN_MODEL,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single usage record as supplied by the data loader.
///
/// Events are consumed read-only and must arrive sorted by `timestamp`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub model: ModelId,
    pub message_id: Option<String>,
    pub request_id: Option<String>,
}

impl UsageEvent {
    pub fn new(timestamp: DateTime<Utc>, model: ModelId) -> Self {
        Self {
            timestamp,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            model,
            message_id: None,
            request_id: None,
        }
    }

    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn with_cache(mut self, creation: u64, read: u64) -> Self {
        self.cache_creation_tokens = creation;
        self.cache_read_tokens = read;
        self
    }

    pub fn with_ids(mut self, message_id: Option<String>, request_id: Option<String>) -> Self {
        self.message_id = message_id;
        self.request_id = request_id;
        self
    }

    /// Key used upstream for deduplication; only present when both ids are
    pub fn dedup_key(&self) -> Option<(&str, &str)> {
        match (&self.message_id, &self.request_id) {
            (Some(message), Some(request)) => Some((message.as_str(), request.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for UsageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageEvent")
            .field("timestamp", &self.timestamp)
            .field("model", &self.model)
            .field("input_tokens", &self.input_tokens)
            .field("output_tokens", &self.output_tokens)
            .field("cache_creation_tokens", &self.cache_creation_tokens)
            .field("cache_read_tokens", &self.cache_read_tokens)
            .field("message_id", &self.message_id.as_ref().map(|_| "[REDACTED]"))
            .field("request_id", &self.request_id.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Per-model token accumulator owned by one session window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub entries_count: u64,
}

impl ModelStats {
    pub(crate) fn record(&mut self, event: &UsageEvent) {
        self.input_tokens = self.input_tokens.saturating_add(event.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(event.output_tokens);
        self.cache_creation_tokens = self
            .cache_creation_tokens
            .saturating_add(event.cache_creation_tokens);
        self.cache_read_tokens = self.cache_read_tokens.saturating_add(event.cache_read_tokens);
        self.entries_count += 1;
    }

    /// Input plus output; cache counters never count toward totals
    pub fn raw_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Read-only per-model projection of the active window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBreakdown {
    pub model: String,
    pub raw_tokens: u64,
    pub weighted_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub entries_count: u64,
}

/// User configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub update_interval_seconds: u64,
    pub initial_delay_seconds: u64,
    pub warning_threshold: f64, // fraction of the limit at which to warn
    pub use_24_hour_clock: bool,
    pub data_paths: Vec<PathBuf>,
    pub manual_override: ManualOverride,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            update_interval_seconds: 3,
            initial_delay_seconds: 1,
            warning_threshold: 0.85,
            use_24_hour_clock: false,
            data_paths: Vec::new(),
            manual_override: ManualOverride::default(),
        }
    }
}
