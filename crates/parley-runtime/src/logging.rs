//! Logging setup for Parley.
//!
//! Parley logs through `tracing`; this module installs a `tracing-subscriber`
//! according to [`LoggingConfig`]. Each request runs inside a `dispatch` span
//! carrying the request source and the selected driver, so span events make
//! the request flow visible.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use parley_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging)?;
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use parley_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("parley_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Default log file name when `file_path` names only a directory.
const DEFAULT_LOG_FILE: &str = "parley.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    /// Log when a span is created.
    pub new: bool,
    /// Log when a span is entered.
    pub enter: bool,
    /// Log when a span is exited.
    pub exit: bool,
    /// Log when a span is closed, with its busy and idle time.
    pub close: bool,
}

impl SpanEvents {
    /// No span events will be logged.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Log span creation and close events.
    ///
    /// Shows one line when a request starts and one when it finishes.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Log all span events.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

// =============================================================================
// Configuration-Based Initialization
// =============================================================================

/// Initializes logging from a [`LoggingConfig`].
///
/// Fails if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) -> RuntimeResult<()> {
    LoggingBuilder::from_config(config)
        .try_init()
        .map_err(|e| RuntimeError::Logging(e.to_string()))
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A builder for configuring logging.
///
/// ```rust,ignore
/// use parley_runtime::logging::{LoggingBuilder, SpanEvents};
/// use tracing::Level;
///
/// LoggingBuilder::new()
///     .with_level(Level::DEBUG)
///     .span_events(SpanEvents::LIFECYCLE)
///     .with_thread_ids(true)
///     .init();
/// ```
#[derive(Debug)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Creates a builder logging compact lines at `INFO` to stdout.
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file_path: None,
            rotation: LogRotation::Never,
        }
    }

    /// Creates a builder from a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .output(config.output)
            .span_events(SpanEvents::from(&config.span_events))
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location)
            .rotation(config.rotation);

        if let Some(path) = &config.file_path {
            builder = builder.file_path(path.clone());
        }

        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in filters {
            builder = builder.directive(&format!("{module}={}", level.as_str()));
        }

        builder
    }

    /// Sets the base log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `parley_framework=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Configures span events.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Sets the output format.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output destination.
    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include thread IDs in log output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Include file names in log output.
    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// Include line numbers in log output.
    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Sets the file for file output.
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    /// Sets how often the log file rotates.
    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Returns the filter directives, base level first.
    pub fn directives(&self) -> Vec<String> {
        let mut all = vec![self.level.to_string().to_lowercase()];
        all.extend(self.directives.iter().cloned());
        all
    }

    /// Builds the filter. `RUST_LOG` replaces the base level when set.
    fn build_filter(&self) -> EnvFilter {
        let base_filter = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base_filter));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => warn!(%directive, error = %e, "Ignoring invalid log directive"),
            }
        }

        filter
    }

    fn file_appender(&self, path: &Path) -> RollingFileAppender {
        RollingFileAppender::new(
            self.rotation.into(),
            path.parent().unwrap_or_else(|| Path::new(".")),
            path.file_name()
                .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE)),
        )
    }

    /// Builds the formatting layer for `writer` in the configured format.
    fn fmt_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.with_target)
            .with_thread_ids(self.with_thread_ids)
            .with_file(self.with_file)
            .with_line_number(self.with_line_number);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Full => layer.boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => {
                eprintln!("JSON log format requires the json-log feature, using full format");
                layer.boxed()
            }
        }
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let layer = match (self.output, self.file_path.as_deref()) {
            (LogOutput::Stdout, _) => self.fmt_layer(std::io::stdout),
            (LogOutput::Stderr, _) => self.fmt_layer(std::io::stderr),
            (LogOutput::File, Some(path)) => self.fmt_layer(self.file_appender(path)),
            (LogOutput::File, None) => {
                eprintln!("File log output requested without a file path, using stdout");
                self.fmt_layer(std::io::stdout)
            }
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(self.build_filter())
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_from_config() {
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(SpanEvents::from(&config), SpanEvents::LIFECYCLE);
    }

    #[test]
    fn test_builder_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        config
            .filters
            .insert("parley_framework".into(), LogLevel::Trace);
        config.filters.insert("parley_core".into(), LogLevel::Debug);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(
            builder.directives(),
            ["warn", "parley_core=debug", "parley_framework=trace"]
        );
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(Rotation::from(LogRotation::Daily), Rotation::DAILY);
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);
    }
}
