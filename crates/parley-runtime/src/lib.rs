//! Parley Runtime - configuration and assembly layer for the Parley router.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, [`ParleyConfig`]) on figment
//! - Logging setup ([`LoggingBuilder`]) on tracing-subscriber
//! - Assembly of a configured [`Orchestrator`](parley_framework::Orchestrator)
//!   ([`ParleyRuntime`])
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: read `parley.toml`
//! - `yaml-config`: read `parley.yaml` / `parley.yml`
//! - `json-log`: JSON log lines
//!
//! ```ignore
//! use parley_runtime::{ConfigLoader, ParleyRuntime};
//!
//! let runtime = ParleyRuntime::builder()
//!     .loader(ConfigLoader::new().profile("production"))
//!     .init_logging(true)
//!     .build()?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    CacheConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, ParleyConfig, Profile,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{ParleyRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the commonly used logging macros alongside the runtime entry point.
pub mod prelude {
    pub use super::ParleyRuntime;
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
