//! Exception registry.
//!
//! Maps failure kinds to ordered lists of handlers. The kind of a [`Failure`]
//! is the short type name of the error it wraps, so a handler registered for
//! `InvalidTokenError` sees exactly the failures raised as that type.
//!
//! ```text
//! handler fails ──▶ Failure { kind } ──▶ ExceptionRegistry::handle
//!                                            │
//!                     ┌──────────────────────┼──────────────────────┐
//!                     ▼                      ▼                      ▼
//!               no handler             N handlers            a handler fails
//!            (Err, unchanged)      (run in order, Ok(N))    (Err, propagated)
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::context::ExecutionContext;
use crate::error::{Failure, short_type_name};
use crate::handler::{BoxedExceptionHandler, ExceptionHandler};

struct Entry<C> {
    kind: String,
    handler: BoxedExceptionHandler<C>,
}

/// Registry of exception handlers keyed by failure kind.
///
/// `C` is the context passed to handlers. It defaults to the framework's
/// [`ExecutionContext`].
pub struct ExceptionRegistry<C = ExecutionContext> {
    entries: RwLock<Vec<Arc<Entry<C>>>>,
}

impl<C> Default for ExceptionRegistry<C> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<C: Send + Sync + 'static> ExceptionRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for failures of `kind`.
    ///
    /// Handlers for the same kind accumulate and run in registration order.
    pub fn register<H>(&self, kind: impl Into<String>, handler: H)
    where
        H: ExceptionHandler<C>,
    {
        let kind = kind.into();
        debug!(%kind, "Registered exception handler");
        self.entries.write().push(Arc::new(Entry {
            kind,
            handler: Arc::new(handler),
        }));
    }

    /// Appends a handler for failures wrapping an `E`.
    pub fn register_for<E, H>(&self, handler: H)
    where
        E: std::error::Error + 'static,
        H: ExceptionHandler<C>,
    {
        self.register(short_type_name::<E>(), handler);
    }

    /// Returns the number of handlers registered for `kind`.
    pub fn handlers_for(&self, kind: &str) -> usize {
        self.entries.read().iter().filter(|e| e.kind == kind).count()
    }

    /// Returns the total number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Dispatches `failure` to every handler registered for its kind.
    ///
    /// Returns how many handlers ran. If none is registered the failure is
    /// handed back unchanged. If a handler fails, its failure is returned and
    /// the remaining handlers are not run.
    pub async fn handle(&self, failure: Failure, ctx: Arc<C>) -> Result<usize, Failure> {
        let handlers: Vec<_> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.kind == failure.kind())
            .cloned()
            .collect();

        if handlers.is_empty() {
            trace!(kind = %failure.kind(), "No exception handler registered");
            return Err(failure);
        }

        let kind = failure.kind();
        let failure = Arc::new(failure);
        for entry in &handlers {
            entry
                .handler
                .call(Arc::clone(&failure), Arc::clone(&ctx))
                .await?;
        }

        debug!(%kind, handlers = handlers.len(), "Failure handled");
        Ok(handlers.len())
    }
}

impl<C> std::fmt::Debug for ExceptionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.entries.read().iter().map(|e| e.kind.clone()).collect();
        f.debug_struct("ExceptionRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerResult;
    use parking_lot::Mutex;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("token expired")]
    struct InvalidTokenError;

    #[derive(Debug, Error)]
    #[error("something else")]
    struct OtherError;

    #[derive(Debug, Error)]
    #[error("wrapped: {0}")]
    struct WrappedError(#[source] InvalidTokenError);

    /// Stand-in context that records handler calls.
    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Log {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    fn recorder(label: &'static str) -> impl ExceptionHandler<Log> {
        move |failure: Arc<Failure>, log: Arc<Log>| async move {
            log.push(format!("{label}:{}", failure.kind()));
            HandlerResult::Ok(())
        }
    }

    #[tokio::test]
    async fn test_unhandled_failure_returned_unchanged() {
        let registry = ExceptionRegistry::<Log>::new();
        registry.register_for::<InvalidTokenError, _>(recorder("token"));

        let log = Arc::new(Log::default());
        let err = registry
            .handle(Failure::from(OtherError), Arc::clone(&log))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "OtherError");
        assert!(err.is::<OtherError>());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_all_handlers_run_in_order() {
        let registry = ExceptionRegistry::<Log>::new();
        registry.register("InvalidTokenError", recorder("first"));
        registry.register("OtherError", recorder("other"));
        registry.register_for::<InvalidTokenError, _>(recorder("second"));
        registry.register("InvalidTokenError", recorder("third"));

        let log = Arc::new(Log::default());
        let handled = registry
            .handle(Failure::from(InvalidTokenError), Arc::clone(&log))
            .await
            .unwrap();

        assert_eq!(handled, 3);
        assert_eq!(
            log.entries(),
            [
                "first:InvalidTokenError",
                "second:InvalidTokenError",
                "third:InvalidTokenError"
            ]
        );
        assert_eq!(registry.handlers_for("InvalidTokenError"), 3);
    }

    #[tokio::test]
    async fn test_kind_match_is_shallow() {
        let registry = ExceptionRegistry::<Log>::new();
        registry.register_for::<InvalidTokenError, _>(recorder("token"));

        let log = Arc::new(Log::default());
        let err = registry
            .handle(Failure::from(WrappedError(InvalidTokenError)), log)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "WrappedError");
    }

    #[tokio::test]
    async fn test_failing_handler_propagates() {
        let registry = ExceptionRegistry::<Log>::new();
        registry.register("InvalidTokenError", |_f: Arc<Failure>, _log: Arc<Log>| async {
            HandlerResult::Err(Failure::from(OtherError))
        });
        registry.register_for::<InvalidTokenError, _>(recorder("after"));

        let log = Arc::new(Log::default());
        let err = registry
            .handle(Failure::from(InvalidTokenError), Arc::clone(&log))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "OtherError");
        assert!(log.entries().is_empty());
    }
}
