//! # Parley
//!
//! A platform-agnostic chat-bot message routing core for Rust.
//!
//! ## Overview
//!
//! Parley receives raw inbound requests from chat platforms, normalizes them
//! through pluggable drivers, matches message text against registered command
//! patterns and runs the matching handlers. Handler failures are routed to
//! exception handlers keyed by failure kind.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ RawRequest  │────▶│ Orchestrator │────▶│ DriverRegistry   │  select + normalize
//! └─────────────┘     │              │────▶│ CommandRegistry  │  first match wins
//!                     │              │────▶│ EventRouter      │  named driver events
//!                     │              │────▶│ ExceptionRegistry│  failure kind → handlers
//!                     └──────────────┘     └──────────────────┘
//!                            │
//!                            ▼
//!                     ConversationStore / UserInfoCache (TTL cache)
//! ```
//!
//! - **Core** (`parley-core`): driver contract, normalized messages, user info, TTL cache
//! - **Framework** (`parley-framework`): commands, exceptions, events, orchestration
//! - **Runtime** (`parley-runtime`): configuration, logging, assembly
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! async fn greet(ctx: Arc<ExecutionContext>, captures: Vec<String>) -> HandlerResult {
//!     ctx.reply(format!("Hello, {}!", captures[0])).await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = ParleyRuntime::new()?;
//!     runtime.drivers().register_fn("slack", |req| Box::new(SlackDriver::new(req)));
//!     runtime.hears("hello {name}", greet)?;
//!
//!     let report = runtime.handle(request).await?;
//!     Ok(())
//! }
//! ```

pub use parley_core::*;
pub use parley_framework::{
    Command, CommandRegistry, DispatchError, DispatchReport, DispatchResult, EventRouter,
    ExceptionRegistry, ExecutionContext, Failure, HandlerResult, MatchResult, Orchestrator,
};
pub use parley_runtime::{ConfigLoader, ParleyConfig, ParleyRuntime, RuntimeError};

/// Everything needed to write drivers and handlers.
pub mod prelude {
    pub use parley_framework::prelude::*;
    pub use parley_runtime::prelude::*;
}
