//! Execution context handed to handlers.
//!
//! One [`ExecutionContext`] is created per handler invocation and shared by
//! `Arc` with any exception handler that runs for the same invocation. It
//! carries:
//!
//! - the driver that received the request
//! - the [`Trigger`]: a message (with its match, if any) or a driver event
//! - the conversation and user stores
//! - the transport options merged into every reply
//!
//! Handlers talk back to the platform through [`reply`](ExecutionContext::reply)
//! and keep state across messages through the conversation helpers.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use parley_core::{
    Answer, DriverEvent, NormalizedMessage, OutgoingMessage, ReplyParams, SharedDriver,
    TransportOptions, UserInfo,
};

use crate::command::MatchResult;
use crate::error::{DispatchError, DispatchResult};
use crate::state::{ConversationStore, UserInfoCache};

/// What caused a handler to run.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// An inbound message. `matched` is `None` when the fallback handles it.
    Message {
        /// The message.
        message: NormalizedMessage,
        /// The command match, if a command matched.
        matched: Option<MatchResult>,
    },
    /// A named driver event.
    Event(DriverEvent),
}

/// Per-invocation context.
pub struct ExecutionContext {
    driver: SharedDriver,
    trigger: Trigger,
    conversations: ConversationStore,
    users: UserInfoCache,
    transport: Arc<TransportOptions>,
}

impl ExecutionContext {
    /// Creates a context.
    pub fn new(
        driver: SharedDriver,
        trigger: Trigger,
        conversations: ConversationStore,
        users: UserInfoCache,
        transport: Arc<TransportOptions>,
    ) -> Self {
        Self {
            driver,
            trigger,
            conversations,
            users,
            transport,
        }
    }

    // =========================================================================
    // Trigger
    // =========================================================================

    /// Returns the driver handling this request.
    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    /// Returns the driver name.
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Returns what triggered the handler.
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Returns the triggering message, if any.
    pub fn message(&self) -> Option<&NormalizedMessage> {
        match &self.trigger {
            Trigger::Message { message, .. } => Some(message),
            Trigger::Event(_) => None,
        }
    }

    /// Returns the command match, if a command matched.
    pub fn match_result(&self) -> Option<&MatchResult> {
        match &self.trigger {
            Trigger::Message { matched, .. } => matched.as_ref(),
            Trigger::Event(_) => None,
        }
    }

    /// Returns the captured groups of the matched command (empty otherwise).
    pub fn captures(&self) -> &[String] {
        self.match_result().map(MatchResult::captures).unwrap_or(&[])
    }

    /// Returns a named capture of the matched command.
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.match_result().and_then(|m| m.named(name))
    }

    /// Returns the triggering event, if any.
    pub fn event(&self) -> Option<&DriverEvent> {
        match &self.trigger {
            Trigger::Event(event) => Some(event),
            Trigger::Message { .. } => None,
        }
    }

    /// Returns the answer to a question asked earlier, if the payload carries one.
    pub fn answer(&self) -> Option<Answer> {
        self.driver.conversation_answer()
    }

    fn require_message(&self) -> DispatchResult<&NormalizedMessage> {
        self.message().ok_or(DispatchError::NoMessage)
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Replies to the triggering message.
    pub async fn reply(&self, message: impl Into<OutgoingMessage>) -> DispatchResult<()> {
        self.reply_with(message, ReplyParams::new()).await
    }

    /// Replies with additional platform parameters.
    ///
    /// The configured transport options are merged underneath `params`; keys
    /// given per call win.
    pub async fn reply_with(
        &self,
        message: impl Into<OutgoingMessage>,
        params: ReplyParams,
    ) -> DispatchResult<()> {
        let in_reply_to = self.require_message()?;
        let mut merged = (*self.transport).clone();
        merged.extend(params);

        trace!(driver = %self.driver.name(), "Sending reply");
        self.driver
            .reply(message.into(), in_reply_to, merged)
            .await?;
        Ok(())
    }

    /// Shows a typing indicator.
    pub async fn types(&self) -> DispatchResult<()> {
        let message = self.require_message()?;
        self.driver.types(message).await?;
        Ok(())
    }

    /// Returns the sender of the triggering message, cached by user id.
    pub async fn user(&self) -> DispatchResult<UserInfo> {
        let message = self.require_message()?;
        self.users.resolve(self.driver.as_ref(), message).await
    }

    // =========================================================================
    // Conversation State
    // =========================================================================

    /// Saves conversation state for this sender and recipient.
    pub async fn save_conversation<T: Serialize>(&self, state: &T) -> DispatchResult<()> {
        let message = self.require_message()?;
        self.conversations
            .save(self.driver.name(), message, state)
            .await?;
        Ok(())
    }

    /// Loads conversation state without removing it.
    pub async fn load_conversation<T: DeserializeOwned>(&self) -> DispatchResult<Option<T>> {
        let message = self.require_message()?;
        Ok(self.conversations.load(self.driver.name(), message).await?)
    }

    /// Removes and returns conversation state.
    pub async fn take_conversation<T: DeserializeOwned>(&self) -> DispatchResult<Option<T>> {
        let message = self.require_message()?;
        Ok(self.conversations.take(self.driver.name(), message).await?)
    }

    /// Returns `true` if a conversation is in progress.
    pub async fn has_conversation(&self) -> DispatchResult<bool> {
        let message = self.require_message()?;
        Ok(self.conversations.exists(self.driver.name(), message).await?)
    }

    /// Ends the conversation.
    pub async fn forget_conversation(&self) -> DispatchResult<bool> {
        let message = self.require_message()?;
        Ok(self.conversations.forget(self.driver.name(), message).await?)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("driver", &self.driver.name())
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_core::{Driver, DriverResult, InMemoryCache, RawRequest};
    use serde_json::json;

    #[derive(Default)]
    struct EchoDriver {
        sent: Mutex<Vec<(String, ReplyParams)>>,
    }

    #[async_trait]
    impl Driver for EchoDriver {
        fn name(&self) -> &str {
            "echo"
        }

        fn matches_request(&self) -> bool {
            true
        }

        fn build_payload(&mut self, _request: &RawRequest) -> DriverResult<()> {
            Ok(())
        }

        fn messages(&self) -> Vec<NormalizedMessage> {
            Vec::new()
        }

        fn is_bot(&self) -> bool {
            false
        }

        fn conversation_answer(&self) -> Option<Answer> {
            None
        }

        async fn reply(
            &self,
            message: OutgoingMessage,
            _in_reply_to: &NormalizedMessage,
            params: ReplyParams,
        ) -> DriverResult<()> {
            self.sent.lock().push((message.text().to_string(), params));
            Ok(())
        }
    }

    fn context(driver: Arc<EchoDriver>, trigger: Trigger) -> ExecutionContext {
        let cache = InMemoryCache::shared();
        let mut transport = TransportOptions::new();
        transport.insert("token".into(), json!("xoxb"));
        transport.insert("unfurl".into(), json!(true));

        ExecutionContext::new(
            driver,
            trigger,
            ConversationStore::new(Arc::clone(&cache)),
            UserInfoCache::new(cache),
            Arc::new(transport),
        )
    }

    fn message_trigger() -> Trigger {
        Trigger::Message {
            message: NormalizedMessage::new("hi", "U1", "C1"),
            matched: None,
        }
    }

    #[tokio::test]
    async fn test_reply_merges_transport_options() {
        let driver = Arc::new(EchoDriver::default());
        let ctx = context(Arc::clone(&driver), message_trigger());

        let mut params = ReplyParams::new();
        params.insert("unfurl".into(), json!(false));
        ctx.reply_with("hello", params).await.unwrap();

        let sent = driver.sent.lock();
        assert_eq!(sent[0].0, "hello");
        assert_eq!(sent[0].1["token"], json!("xoxb"));
        assert_eq!(sent[0].1["unfurl"], json!(false));
    }

    #[tokio::test]
    async fn test_event_context_has_no_message() {
        let driver = Arc::new(EchoDriver::default());
        let ctx = context(
            driver,
            Trigger::Event(DriverEvent::named("joined", json!({}))),
        );

        assert!(ctx.message().is_none());
        assert_eq!(ctx.event().and_then(DriverEvent::name), Some("joined"));
        assert!(ctx.captures().is_empty());
        assert!(matches!(
            ctx.reply("hello").await,
            Err(DispatchError::NoMessage)
        ));
    }

    #[tokio::test]
    async fn test_conversation_helpers() {
        let driver = Arc::new(EchoDriver::default());
        let ctx = context(driver, message_trigger());

        assert!(!ctx.has_conversation().await.unwrap());
        ctx.save_conversation(&json!({"step": "ask_name"}))
            .await
            .unwrap();
        assert!(ctx.has_conversation().await.unwrap());

        let state: Option<serde_json::Value> = ctx.take_conversation().await.unwrap();
        assert_eq!(state, Some(json!({"step": "ask_name"})));
        assert!(!ctx.forget_conversation().await.unwrap());
    }

    #[tokio::test]
    async fn test_user_defaults_to_sender_id() {
        let driver = Arc::new(EchoDriver::default());
        let ctx = context(driver, message_trigger());
        assert_eq!(ctx.user().await.unwrap().id(), "U1");
    }
}
