//! Configuration schema definitions.
//!
//! ```toml
//! [cache]
//! conversation_ttl_minutes = 40
//! user_ttl_minutes = 30
//!
//! [transport]
//! token = "xoxb-..."
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! output = "stdout"
//!
//! [logging.filters]
//! parley_framework = "debug"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use parley_core::TransportOptions;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ParleyConfig {
    /// Conversation and user cache lifetimes.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Options passed to drivers on every reply, underneath per-call parameters.
    #[serde(default)]
    pub transport: TransportOptions,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Cache
// =============================================================================

/// Cache lifetimes, in minutes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of conversation state.
    #[serde(default = "default_conversation_ttl_minutes")]
    pub conversation_ttl_minutes: u64,

    /// Lifetime of cached user information.
    #[serde(default = "default_user_ttl_minutes")]
    pub user_ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            conversation_ttl_minutes: default_conversation_ttl_minutes(),
            user_ttl_minutes: default_user_ttl_minutes(),
        }
    }
}

impl CacheConfig {
    /// Returns the conversation lifetime.
    pub fn conversation_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_ttl_minutes.saturating_mul(60))
    }

    /// Returns the user info lifetime.
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_minutes.saturating_mul(60))
    }
}

/// Upper bound accepted for either lifetime: one year.
pub const MAX_TTL_MINUTES: u64 = 365 * 24 * 60;

fn default_conversation_ttl_minutes() -> u64 {
    40
}

fn default_user_ttl_minutes() -> u64 {
    30
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the level as a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Write to `file_path`.
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `parley_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            rotation: LogRotation::Never,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}
