//! Runtime error types.

use thiserror::Error;

use parley_framework::CommandError;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur while assembling the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A command could not be registered.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The global logging subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
