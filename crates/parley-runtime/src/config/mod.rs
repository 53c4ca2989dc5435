//! Configuration module for the Parley runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for cache lifetimes, transport options and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CacheConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MAX_TTL_MINUTES,
    ParleyConfig, SpanEventConfig,
};
pub use validation::validate_config;
