//! Request orchestration.
//!
//! The [`Orchestrator`] owns every registry and drives one inbound request
//! from raw transport bytes to handler execution:
//!
//! ```text
//! RawRequest
//!     │
//!     ▼
//! DriverRegistry::select ──▶ none ──▶ DispatchError::NoDriver
//!     │
//!     ▼
//! Driver::build_payload ──▶ error ──▶ DispatchError::Driver
//!     │
//!     ├──▶ Driver::events ──▶ EventRouter ──▶ subscribers
//!     │
//!     ▼ (unless the sender is the bot)
//! for each message not from the bot:
//!     CommandRegistry::find_match_for
//!         ├── match    ──▶ command handler(captures)
//!         └── no match ──▶ fallback handler, if any
//!
//! handler failure ──▶ ExceptionRegistry::handle ──▶ unhandled ──▶ DispatchError::Unhandled
//! ```
//!
//! Registries are shared by `Arc`; cloning an orchestrator is cheap and every
//! clone sees the same registrations. Each request gets its own driver
//! instance, so concurrent requests never share driver state.
//!
//! The orchestrator is also a `tower::Service<RawRequest>`, which lets
//! transport code layer timeouts, concurrency limits and the like over it.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tower::Service;
use tracing::{Instrument, Level, Span, debug, error, field, span, trace, warn};

use parley_core::{
    DriverRegistry, InMemoryCache, NormalizedMessage, RawRequest, SharedCache, SharedDriver,
    TransportOptions,
};

use crate::command::{Command, CommandRegistry};
use crate::context::{ExecutionContext, Trigger};
use crate::error::{CommandResult, DispatchError, DispatchResult, HandlerResult};
use crate::events::EventRouter;
use crate::exception::ExceptionRegistry;
use crate::handler::{BoxedHandler, CommandHandler, ExceptionHandler, Handler};
use crate::state::{ConversationStore, DEFAULT_CONVERSATION_TTL, DEFAULT_USER_TTL, UserInfoCache};

// =============================================================================
// Dispatch Report
// =============================================================================

/// Summary of one processed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Name of the driver that handled the request.
    pub driver: String,
    /// Messages the driver extracted.
    pub messages: usize,
    /// Messages that matched a command.
    pub matched: usize,
    /// Messages that matched no command.
    pub unmatched: usize,
    /// Messages skipped because the bot sent them.
    pub skipped_from_bot: usize,
    /// Events delivered to at least one subscriber.
    pub events: usize,
    /// `true` if the driver reported the bot itself as the sender.
    pub bot_sender: bool,
}

// =============================================================================
// Orchestrator
// =============================================================================

struct Inner {
    drivers: DriverRegistry,
    commands: CommandRegistry,
    exceptions: ExceptionRegistry,
    events: EventRouter,
    fallback: RwLock<Option<BoxedHandler>>,
    conversations: ConversationStore,
    users: UserInfoCache,
    transport: Arc<TransportOptions>,
}

/// Routes inbound requests to command, event and fallback handlers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over an in-memory cache with default lifetimes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Returns the driver registry.
    pub fn drivers(&self) -> &DriverRegistry {
        &self.inner.drivers
    }

    /// Returns the command registry.
    pub fn commands(&self) -> &CommandRegistry {
        &self.inner.commands
    }

    /// Returns the exception registry.
    pub fn exceptions(&self) -> &ExceptionRegistry {
        &self.inner.exceptions
    }

    /// Returns the event router.
    pub fn events(&self) -> &EventRouter {
        &self.inner.events
    }

    /// Returns the conversation store.
    pub fn conversations(&self) -> &ConversationStore {
        &self.inner.conversations
    }

    /// Returns the user info cache.
    pub fn users(&self) -> &UserInfoCache {
        &self.inner.users
    }

    /// Registers an unrestricted command.
    pub fn hears<H: CommandHandler>(
        &self,
        pattern: impl Into<String>,
        handler: H,
    ) -> CommandResult<&Self> {
        self.inner.commands.hears(pattern, handler)?;
        Ok(self)
    }

    /// Registers a prepared command.
    pub fn command(&self, command: Command) -> &Self {
        self.inner.commands.register(command);
        self
    }

    /// Subscribes to a driver event.
    pub fn on<H: Handler>(&self, event: impl Into<String>, handler: H) -> &Self {
        self.inner.events.on(event, handler);
        self
    }

    /// Registers an exception handler for errors of type `E`.
    pub fn exception<E, H>(&self, handler: H) -> &Self
    where
        E: std::error::Error + 'static,
        H: ExceptionHandler<ExecutionContext>,
    {
        self.inner.exceptions.register_for::<E, H>(handler);
        self
    }

    /// Sets the handler for messages no command matches, replacing any previous one.
    pub fn fallback<H: Handler>(&self, handler: H) -> &Self {
        *self.inner.fallback.write() = Some(Arc::new(handler));
        self
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Processes one inbound request.
    pub async fn handle(&self, request: RawRequest) -> DispatchResult<DispatchReport> {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            source = ?request.source(),
            driver = field::Empty
        );
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: RawRequest) -> DispatchResult<DispatchReport> {
        let Some(mut driver) = self.inner.drivers.select(&request) else {
            warn!("No driver matches the request");
            return Err(DispatchError::NoDriver);
        };
        Span::current().record("driver", driver.name());

        if let Err(e) = driver.build_payload(&request) {
            warn!(error = %e, "Failed to build driver payload");
            return Err(e.into());
        }
        let driver: SharedDriver = Arc::from(driver);

        let mut report = DispatchReport {
            driver: driver.name().to_string(),
            ..Default::default()
        };

        report.events = self.dispatch_events(&driver).await?;

        if driver.is_bot() {
            debug!("Sender is the bot itself, skipping messages");
            report.bot_sender = true;
            return Ok(report);
        }

        let messages = driver.messages();
        report.messages = messages.len();

        for message in messages {
            if message.is_from_bot() {
                trace!(sender = %message.sender_id(), "Skipping message from the bot");
                report.skipped_from_bot += 1;
                continue;
            }

            if self.dispatch_message(&driver, message).await? {
                report.matched += 1;
            } else {
                report.unmatched += 1;
            }
        }

        debug!(
            messages = report.messages,
            matched = report.matched,
            unmatched = report.unmatched,
            events = report.events,
            "Request processed"
        );
        Ok(report)
    }

    /// Runs the matching command or the fallback. Returns `true` on a match.
    async fn dispatch_message(
        &self,
        driver: &SharedDriver,
        message: NormalizedMessage,
    ) -> DispatchResult<bool> {
        let matched = self
            .inner
            .commands
            .find_match_for(Some(driver.name()), &message);

        let Some(matched) = matched else {
            let fallback = self.inner.fallback.read().clone();
            if let Some(fallback) = fallback {
                trace!("Running fallback handler");
                let ctx = self.context(driver, Trigger::Message { message, matched: None });
                let result = fallback.call(Arc::clone(&ctx)).await;
                self.settle(result, ctx).await?;
            }
            return Ok(false);
        };

        let command = Arc::clone(matched.command());
        let captures = matched.captures().to_vec();
        let ctx = self.context(
            driver,
            Trigger::Message {
                message,
                matched: Some(matched),
            },
        );

        trace!(command = %command.name(), "Running command handler");
        let result = command.handler().call(Arc::clone(&ctx), captures).await;
        self.settle(result, ctx).await?;
        Ok(true)
    }

    /// Names each driver event and runs its subscribers. Returns how many
    /// events reached at least one subscriber.
    async fn dispatch_events(&self, driver: &SharedDriver) -> DispatchResult<usize> {
        let mut delivered = 0;

        for event in driver.events() {
            let Some(name) = self.inner.events.name_event(&event) else {
                continue;
            };

            let subscribers = self.inner.events.subscribers_for(&name);
            if subscribers.is_empty() {
                trace!(event = %name, "No subscriber for event");
                continue;
            }

            debug!(event = %name, subscribers = subscribers.len(), "Dispatching event");
            let ctx = self.context(driver, Trigger::Event(event));
            for subscriber in subscribers {
                let result = subscriber.call(Arc::clone(&ctx)).await;
                self.settle(result, Arc::clone(&ctx)).await?;
            }
            delivered += 1;
        }

        Ok(delivered)
    }

    /// Routes a handler failure to the exception registry.
    async fn settle(&self, result: HandlerResult, ctx: Arc<ExecutionContext>) -> DispatchResult<()> {
        let Err(failure) = result else {
            return Ok(());
        };

        debug!(kind = %failure.kind(), "Handler failed");
        match self.inner.exceptions.handle(failure, ctx).await {
            Ok(_) => Ok(()),
            Err(failure) => {
                error!(kind = %failure.kind(), error = %failure, "Unhandled failure");
                Err(DispatchError::Unhandled(failure))
            }
        }
    }

    fn context(&self, driver: &SharedDriver, trigger: Trigger) -> Arc<ExecutionContext> {
        Arc::new(ExecutionContext::new(
            Arc::clone(driver),
            trigger,
            self.inner.conversations.clone(),
            self.inner.users.clone(),
            Arc::clone(&self.inner.transport),
        ))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("drivers", &self.inner.drivers)
            .field("commands", &self.inner.commands)
            .field("exceptions", &self.inner.exceptions)
            .field("events", &self.inner.events)
            .field("fallback", &self.inner.fallback.read().is_some())
            .finish()
    }
}

impl Service<RawRequest> for Orchestrator {
    type Response = DispatchReport;
    type Error = DispatchError;
    type Future = BoxFuture<'static, DispatchResult<DispatchReport>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RawRequest) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.handle(request).await })
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`Orchestrator`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    cache: Option<SharedCache>,
    conversation_ttl: Option<Duration>,
    user_ttl: Option<Duration>,
    transport: TransportOptions,
}

impl OrchestratorBuilder {
    /// Uses `cache` for conversation and user state. Defaults to an [`InMemoryCache`].
    pub fn cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the conversation state lifetime. Defaults to 40 minutes.
    pub fn conversation_ttl(mut self, ttl: Duration) -> Self {
        self.conversation_ttl = Some(ttl);
        self
    }

    /// Sets the user info lifetime. Defaults to 30 minutes.
    pub fn user_ttl(mut self, ttl: Duration) -> Self {
        self.user_ttl = Some(ttl);
        self
    }

    /// Sets the transport options merged into every reply.
    pub fn transport(mut self, options: TransportOptions) -> Self {
        self.transport = options;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Orchestrator {
        let cache = self.cache.unwrap_or_else(InMemoryCache::shared);
        let conversations = ConversationStore::with_ttl(
            Arc::clone(&cache),
            self.conversation_ttl.unwrap_or(DEFAULT_CONVERSATION_TTL),
        );
        let users = UserInfoCache::with_ttl(cache, self.user_ttl.unwrap_or(DEFAULT_USER_TTL));

        Orchestrator {
            inner: Arc::new(Inner {
                drivers: DriverRegistry::new(),
                commands: CommandRegistry::new(),
                exceptions: ExceptionRegistry::new(),
                events: EventRouter::new(),
                fallback: RwLock::new(None),
                conversations,
                users,
                transport: Arc::new(self.transport),
            }),
        }
    }
}

impl std::fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("conversation_ttl", &self.conversation_ttl)
            .field("user_ttl", &self.user_ttl)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let orchestrator = Orchestrator::new();
        assert_eq!(orchestrator.conversations().ttl(), DEFAULT_CONVERSATION_TTL);
        assert_eq!(orchestrator.users().ttl(), DEFAULT_USER_TTL);
        assert!(orchestrator.commands().is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let orchestrator = Orchestrator::builder()
            .conversation_ttl(Duration::from_secs(60))
            .user_ttl(Duration::from_secs(30))
            .build();
        assert_eq!(orchestrator.conversations().ttl(), Duration::from_secs(60));
        assert_eq!(orchestrator.users().ttl(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_no_driver() {
        let orchestrator = Orchestrator::new();
        let err = orchestrator
            .handle(RawRequest::webhook("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoDriver));
    }

    #[test]
    fn test_clones_share_registrations() {
        async fn noop(_ctx: Arc<ExecutionContext>, _c: Vec<String>) -> HandlerResult {
            Ok(())
        }

        let orchestrator = Orchestrator::new();
        let clone = orchestrator.clone();
        clone.hears("hello", noop).unwrap();
        assert_eq!(orchestrator.commands().len(), 1);
    }
}
