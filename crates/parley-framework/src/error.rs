//! Error types for the Parley framework.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use parley_core::{CacheError, DriverError};

// =============================================================================
// Failure
// =============================================================================

/// A failure raised by a command, event or fallback handler.
///
/// `Failure` boxes any error and remembers the short name of its concrete
/// type, which the [`ExceptionRegistry`](crate::ExceptionRegistry) uses as the
/// dispatch key. Any `std::error::Error` converts into a `Failure` with `?`.
///
/// The kind is shallow: a wrapper error is keyed by the wrapper's own type,
/// never by the errors it wraps.
///
/// ```rust
/// use parley_framework::Failure;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("token expired")]
/// struct InvalidTokenError;
///
/// let failure = Failure::from(InvalidTokenError);
/// assert_eq!(failure.kind(), "InvalidTokenError");
/// assert!(failure.is::<InvalidTokenError>());
/// ```
pub struct Failure {
    kind: &'static str,
    inner: Box<dyn StdError + Send + Sync + 'static>,
}

impl Failure {
    /// Wraps an error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind: short_type_name::<E>(),
            inner: Box::new(error),
        }
    }

    /// Creates a failure from a plain message. Its kind is `MessageError`.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(MessageError(message.to_string()))
    }

    /// Returns the short type name of the wrapped error.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns `true` if the wrapped error is an `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    /// Returns the wrapped error as `E`, if it is one.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns the wrapped error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Unwraps into the boxed error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.inner
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("error", &self.inner)
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.inner)
    }
}

/// Ad-hoc error created by [`Failure::msg`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MessageError(pub String);

/// Returns the last path segment of `E`'s type name, without generics.
///
/// `app::auth::InvalidTokenError` becomes `InvalidTokenError`, and
/// `app::Wrapper<app::Inner>` becomes `Wrapper`.
pub fn short_type_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// Command Errors
// =============================================================================

/// Errors that can occur while registering commands.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The command pattern is not a valid regular expression.
    #[error("invalid command pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as registered.
        pattern: String,
        /// Why the regex engine rejected it.
        reason: String,
    },
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors that terminate the processing of one inbound request.
///
/// They never affect other in-flight requests or shared registry state.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered driver recognized the request.
    #[error("no driver matches the request")]
    NoDriver,

    /// An operation needed the triggering message, but the context was
    /// created for an event.
    #[error("no message in this context")]
    NoMessage,

    /// The selected driver failed (payload parse or delivery).
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Conversation or user state could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A handler failed and no exception handler claimed the failure, or an
    /// exception handler itself failed.
    #[error("unhandled failure: {0}")]
    Unhandled(Failure),
}

impl DispatchError {
    /// Returns the unhandled failure, if this is one.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Unhandled(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type returned by handlers.
pub type HandlerResult<T = ()> = Result<T, Failure>;

/// Result type for command registration.
pub type CommandResult<T> = Result<T, CommandError>;

/// Result type for request dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[derive(Debug, Error)]
    #[error("generic")]
    struct Generic<T: fmt::Debug>(T);

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Inner>(), "Inner");
        assert_eq!(short_type_name::<Generic<Inner>>(), "Generic");
        assert_eq!(short_type_name::<DriverError>(), "DriverError");
    }

    #[test]
    fn test_kind_is_shallow() {
        let failure = Failure::from(Outer(Inner));
        assert_eq!(failure.kind(), "Outer");
        assert!(failure.is::<Outer>());
        assert!(!failure.is::<Inner>());
    }

    #[test]
    fn test_msg_failure() {
        let failure = Failure::msg("boom");
        assert_eq!(failure.kind(), "MessageError");
        assert_eq!(failure.to_string(), "MessageError: boom");
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse(input: &str) -> HandlerResult<i32> {
            Ok(input.parse::<i32>()?)
        }

        let failure = parse("x").unwrap_err();
        assert_eq!(failure.kind(), "ParseIntError");
        assert_eq!(parse("4").unwrap(), 4);
    }
}
