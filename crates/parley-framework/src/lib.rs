//! # Parley Framework
//!
//! Command matching, exception routing and request orchestration on top of
//! `parley-core`.
//!
//! This layer provides:
//! - [`CommandRegistry`]: regex commands matched first-registered-first
//! - [`ExceptionRegistry`]: failure kind → ordered handlers
//! - [`EventRouter`]: named driver events → subscribers
//! - [`ConversationStore`] and [`UserInfoCache`]: namespaced TTL state
//! - [`Orchestrator`]: drives a request from driver selection to handlers,
//!   also usable as a `tower::Service<RawRequest>`
//!
//! ## Example
//!
//! ```rust,ignore
//! use parley_framework::prelude::*;
//!
//! async fn remind(ctx: Arc<ExecutionContext>, captures: Vec<String>) -> HandlerResult {
//!     ctx.reply(format!("I'll remind you {}", captures[0])).await?;
//!     Ok(())
//! }
//!
//! let bot = Orchestrator::new();
//! bot.drivers().register_fn("slack", |req| Box::new(SlackDriver::new(req)));
//! bot.hears(r"remind me (\w+)", remind)?;
//!
//! let report = bot.handle(request).await?;
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod events;
pub mod exception;
pub mod handler;
pub mod orchestrator;
pub mod state;

pub use command::{Command, CommandRegistry, MatchResult};
pub use context::{ExecutionContext, Trigger};
pub use error::{
    CommandError, CommandResult, DispatchError, DispatchResult, Failure, HandlerResult,
    MessageError, short_type_name,
};
pub use events::EventRouter;
pub use exception::ExceptionRegistry;
pub use handler::{
    BoxedCommandHandler, BoxedExceptionHandler, BoxedHandler, CommandHandler, ExceptionHandler,
    Handler,
};
pub use orchestrator::{DispatchReport, Orchestrator, OrchestratorBuilder};
pub use state::{
    ConversationStore, DEFAULT_CONVERSATION_TTL, DEFAULT_USER_TTL, UserInfoCache,
};

/// Prelude for common imports.
pub mod prelude {
    pub use std::sync::Arc;

    pub use parley_core::prelude::*;

    pub use super::{
        Command, DispatchError, ExecutionContext, Failure, HandlerResult, Orchestrator,
    };
}
