//! Handler traits for the Parley framework.
//!
//! Three kinds of handlers exist, all implemented automatically for async
//! closures and functions of the right shape:
//!
//! - [`CommandHandler`]: `async fn(Arc<ExecutionContext>, Vec<String>) -> HandlerResult`,
//!   invoked with the captured groups of a matched command
//! - [`Handler`]: `async fn(Arc<ExecutionContext>) -> HandlerResult`, used for
//!   event subscribers and the no-match fallback
//! - [`ExceptionHandler`]: `async fn(Arc<Failure>, Arc<C>) -> HandlerResult`,
//!   registered in the [`ExceptionRegistry`](crate::ExceptionRegistry)
//!
//! # Example
//!
//! ```rust,ignore
//! async fn remind(ctx: Arc<ExecutionContext>, captures: Vec<String>) -> HandlerResult {
//!     ctx.reply(format!("I'll remind you {}", captures[0])).await?;
//!     Ok(())
//! }
//!
//! commands.hears(r"remind me (\w+)", remind)?;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::ExecutionContext;
use crate::error::{Failure, HandlerResult};

// ============================================================================
// Command Handlers
// ============================================================================

/// Handler invoked for a matched command.
pub trait CommandHandler: Send + Sync + 'static {
    /// Runs the command with its captured groups, in pattern order.
    fn call(
        &self,
        ctx: Arc<ExecutionContext>,
        captures: Vec<String>,
    ) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> CommandHandler for F
where
    F: Fn(Arc<ExecutionContext>, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        ctx: Arc<ExecutionContext>,
        captures: Vec<String>,
    ) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx, captures))
    }
}

/// A type-erased command handler.
pub type BoxedCommandHandler = Arc<dyn CommandHandler>;

// ============================================================================
// Context Handlers
// ============================================================================

/// Handler invoked with only the execution context.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: Arc<ExecutionContext>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Arc<ExecutionContext>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx))
    }
}

/// A type-erased context handler.
pub type BoxedHandler = Arc<dyn Handler>;

// ============================================================================
// Exception Handlers
// ============================================================================

/// Handler invoked for a failure of a registered kind.
///
/// `C` is the execution context the failure happened in.
pub trait ExceptionHandler<C>: Send + Sync + 'static {
    /// Handles the failure.
    fn call(&self, failure: Arc<Failure>, ctx: Arc<C>) -> BoxFuture<'static, HandlerResult>;
}

impl<C, F, Fut> ExceptionHandler<C> for F
where
    F: Fn(Arc<Failure>, Arc<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, failure: Arc<Failure>, ctx: Arc<C>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(failure, ctx))
    }
}

/// A type-erased exception handler.
pub type BoxedExceptionHandler<C> = Arc<dyn ExceptionHandler<C>>;
