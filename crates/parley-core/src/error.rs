//! Unified error types for the Parley core.
//!
//! This module provides the error types raised at the driver boundary and by
//! cache backends. Framework-level errors (command registration, dispatch) are
//! defined in `parley-framework`.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Errors that can occur inside a platform driver.
///
/// Every variant is local to the single request or reply that raised it and
/// never affects shared registry or cache state.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The inbound payload could not be parsed.
    #[error("failed to parse payload for driver '{driver}': {reason}")]
    PayloadParse {
        /// The driver that rejected the payload.
        driver: String,
        /// Reason for failure.
        reason: String,
    },

    /// An outgoing reply could not be delivered.
    ///
    /// Drivers never retry on their own; retry policy belongs to the caller.
    #[error("failed to deliver reply via '{driver}': {reason}")]
    Delivery {
        /// The driver that attempted the send.
        driver: String,
        /// Reason for failure.
        reason: String,
    },

    /// User information could not be resolved.
    #[error("failed to look up user '{user_id}': {reason}")]
    UserLookup {
        /// The platform user id.
        user_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Internal driver error.
    #[error("driver error: {0}")]
    Internal(String),
}

impl DriverError {
    /// Creates a payload parse error.
    pub fn parse(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PayloadParse {
            driver: driver.into(),
            reason: reason.into(),
        }
    }

    /// Creates a delivery error.
    pub fn delivery(driver: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delivery {
            driver: driver.into(),
            reason: reason.into(),
        }
    }

    /// Creates an internal driver error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns `true` if this error came from parsing an inbound payload.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::PayloadParse { .. })
    }

    /// Returns `true` if this error came from a failed reply.
    pub fn is_delivery_error(&self) -> bool {
        matches!(self, Self::Delivery { .. })
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors raised by a cache backend.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The backing store could not be reached or rejected the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A cached value could not be (de)serialized.
    #[error("cache serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Event Errors
// =============================================================================

/// Errors raised while routing driver events.
#[derive(Debug, Clone, Error)]
pub enum EventError {
    /// The event already had its name assigned.
    #[error("event already named '{existing}', cannot rename to '{attempted}'")]
    NameAlreadyAssigned {
        /// The name the event carries.
        existing: String,
        /// The name that was rejected.
        attempted: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;
