//! # Parley Core
//!
//! The platform-independent foundation of the Parley chat-bot router.
//!
//! This crate defines what every platform driver must provide and the data
//! model that flows out of it:
//!
//! - **Message Model**: [`NormalizedMessage`], [`Answer`], [`OutgoingMessage`]
//! - **User Model**: [`UserInfo`] with get → is → raw attribute resolution
//! - **Events**: [`DriverEvent`] for non-message platform notifications
//! - **Driver Contract**: [`Driver`] plus the priority-ordered [`DriverRegistry`]
//! - **State Cache**: the [`TtlCache`] contract and [`InMemoryCache`]
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ RawRequest  │────▶│    Driver    │────▶│ NormalizedMessage │──▶ matcher
//! │ (transport) │     │ (per request)│────▶│   DriverEvent     │──▶ subscribers
//! └─────────────┘     └──────────────┘     └───────────────────┘
//!                            ▲
//!                            └── reply(OutgoingMessage, ReplyParams)
//! ```
//!
//! Command matching, exception routing and orchestration live in
//! `parley-framework`.

pub mod cache;
pub mod driver;
pub mod error;
pub mod event;
pub mod message;
pub mod user;

pub use cache::{Expiry, InMemoryCache, SharedCache, TtlCache};
pub use driver::{
    BoxedDriver, Driver, DriverFactory, DriverRegistry, FnDriverFactory, RawRequest,
    RequestSource, SharedDriver, TransportOptions,
};
pub use error::{
    CacheError, CacheResult, DriverError, DriverResult, EventError, EventResult,
};
pub use event::DriverEvent;
pub use message::{Answer, Button, NormalizedMessage, OutgoingMessage, Question, ReplyParams};
pub use user::{AccessorTable, Flag, Getter, PlatformUser, UserInfo, UserSnapshot};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Answer, Driver, DriverError, DriverEvent, DriverResult, NormalizedMessage,
        OutgoingMessage, RawRequest, ReplyParams, TtlCache, UserInfo,
    };
}
