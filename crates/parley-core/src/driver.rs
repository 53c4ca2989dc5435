//! Driver trait and registry.
//!
//! A [`Driver`] adapts one chat platform's transport into the normalized
//! message model and sends replies back. Drivers are stateful and short-lived:
//! one instance is created per inbound request, asked whether it recognizes the
//! request, then fed the payload and queried.
//!
//! ```text
//! RawRequest ──▶ DriverRegistry::select ──▶ Driver::build_payload
//!                                               │
//!                     NormalizedMessage ◀── Driver::messages
//! ```
//!
//! # Selection
//!
//! The [`DriverRegistry`] holds driver factories in priority order. For each
//! request it instantiates drivers one by one and picks the first that is
//! configured and whose [`matches_request`](Driver::matches_request) returns
//! `true`. Ties are broken by registration order.
//!
//! # Example
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Driver for WebhookDriver {
//!     fn name(&self) -> &str { "webhook" }
//!
//!     fn matches_request(&self) -> bool {
//!         self.request.header_value("x-webhook-event").is_some()
//!     }
//!
//!     fn build_payload(&mut self, request: &RawRequest) -> DriverResult<()> {
//!         self.payload = request.json().map_err(|e| DriverError::parse("webhook", e.to_string()))?;
//!         Ok(())
//!     }
//!
//!     // ...
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::DriverResult;
use crate::event::DriverEvent;
use crate::message::{Answer, NormalizedMessage, OutgoingMessage, ReplyParams};
use crate::user::{UserInfo, UserSnapshot};

/// Transport options passed uninterpreted to every outbound call.
pub type TransportOptions = Map<String, Value>;

// =============================================================================
// Raw Request
// =============================================================================

/// How a request reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestSource {
    /// An HTTP webhook delivery.
    #[default]
    Webhook,
    /// A frame from a persistent socket connection.
    Socket,
}

/// An inbound transport request, opaque to everything except drivers.
///
/// Header names are stored lowercased.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    source: RequestSource,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

impl RawRequest {
    /// Creates a webhook request with the given body.
    pub fn webhook(body: impl Into<Vec<u8>>) -> Self {
        Self {
            source: RequestSource::Webhook,
            body: body.into(),
            ..Default::default()
        }
    }

    /// Creates a socket frame request.
    pub fn socket(frame: impl Into<Vec<u8>>) -> Self {
        Self {
            source: RequestSource::Socket,
            body: frame.into(),
            ..Default::default()
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds a query parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Returns how the request arrived.
    pub fn source(&self) -> RequestSource {
        self.source
    }

    /// Looks up a header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Returns the raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as UTF-8 text, if valid.
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

// =============================================================================
// Driver Trait
// =============================================================================

/// The platform driver contract.
///
/// Drivers are responsible for:
///
/// - Recognizing requests from their platform ([`matches_request`](Self::matches_request))
/// - Parsing payloads into driver state ([`build_payload`](Self::build_payload))
/// - Exposing the normalized messages, answers and events in that payload
/// - Sending replies
///
/// The matcher and exception registry never see platform-specific types.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the driver name (e.g., "slack").
    ///
    /// Used in cache namespaces, logs and command driver restrictions.
    fn name(&self) -> &str;

    /// Returns `true` if the driver has the configuration it needs.
    ///
    /// Unconfigured drivers are never selected.
    fn is_configured(&self) -> bool {
        true
    }

    /// Returns `true` if this driver recognizes the request it was created for.
    ///
    /// Must not have side effects and must return `false` rather than fail on
    /// malformed input.
    fn matches_request(&self) -> bool;

    /// Parses the raw request into internal driver state.
    ///
    /// Called once per request. A [`DriverError::PayloadParse`](crate::DriverError::PayloadParse)
    /// aborts processing of this request only.
    fn build_payload(&mut self, request: &RawRequest) -> DriverResult<()>;

    /// Returns the messages extracted from the last built payload.
    fn messages(&self) -> Vec<NormalizedMessage>;

    /// Returns `true` if the current sender is the bot itself.
    fn is_bot(&self) -> bool;

    /// Returns the answer to a previously asked question, if the payload carries one.
    fn conversation_answer(&self) -> Option<Answer>;

    /// Returns the non-message events carried by the payload.
    fn events(&self) -> Vec<DriverEvent> {
        Vec::new()
    }

    /// Resolves information about the sender of `message`.
    ///
    /// The default knows nothing but the sender id.
    async fn user(&self, message: &NormalizedMessage) -> DriverResult<UserInfo> {
        Ok(UserInfo::from_snapshot(UserSnapshot::new(
            message.sender_id(),
        )))
    }

    /// Sends `message` in reply to `in_reply_to`.
    ///
    /// `params` is platform-defined and passed through untouched. Failures are
    /// reported as [`DriverError::Delivery`](crate::DriverError::Delivery) and
    /// are not retried by the driver.
    async fn reply(
        &self,
        message: OutgoingMessage,
        in_reply_to: &NormalizedMessage,
        params: ReplyParams,
    ) -> DriverResult<()>;

    /// Shows a typing indicator where the platform supports one.
    async fn types(&self, _message: &NormalizedMessage) -> DriverResult<()> {
        Ok(())
    }
}

/// A boxed driver trait object.
pub type BoxedDriver = Box<dyn Driver>;

/// A shared driver, used once the payload has been built.
pub type SharedDriver = Arc<dyn Driver>;

// =============================================================================
// Driver Factories
// =============================================================================

/// Creates driver instances for inbound requests.
pub trait DriverFactory: Send + Sync {
    /// Returns the name of the drivers this factory creates.
    fn name(&self) -> &str;

    /// Creates a driver bound to `request`.
    fn create(&self, request: &RawRequest) -> BoxedDriver;
}

/// A [`DriverFactory`] backed by a closure.
pub struct FnDriverFactory<F> {
    name: String,
    create: F,
}

impl<F> FnDriverFactory<F>
where
    F: Fn(&RawRequest) -> BoxedDriver + Send + Sync,
{
    /// Creates a named factory from a closure.
    pub fn new(name: impl Into<String>, create: F) -> Self {
        Self {
            name: name.into(),
            create,
        }
    }
}

impl<F> DriverFactory for FnDriverFactory<F>
where
    F: Fn(&RawRequest) -> BoxedDriver + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, request: &RawRequest) -> BoxedDriver {
        (self.create)(request)
    }
}

/// Registry of driver factories queried in priority order.
///
/// Registration may interleave with selection; each selection iterates a
/// snapshot taken under the lock.
#[derive(Default)]
pub struct DriverRegistry {
    factories: RwLock<Vec<Arc<dyn DriverFactory>>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory after all previously registered ones.
    pub fn register<F: DriverFactory + 'static>(&self, factory: F) {
        debug!(driver = %factory.name(), "Registered driver factory");
        self.factories.write().push(Arc::new(factory));
    }

    /// Registers a closure-backed factory.
    pub fn register_fn<F>(&self, name: impl Into<String>, create: F)
    where
        F: Fn(&RawRequest) -> BoxedDriver + Send + Sync + 'static,
    {
        self.register(FnDriverFactory::new(name, create));
    }

    /// Returns the registered driver names in priority order.
    pub fn names(&self) -> Vec<String> {
        self.factories
            .read()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Returns the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    /// Returns `true` if no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// Picks the driver for `request`.
    ///
    /// Returns the first configured driver that recognizes the request, or
    /// `None` if no driver does.
    pub fn select(&self, request: &RawRequest) -> Option<BoxedDriver> {
        let snapshot: Vec<_> = self.factories.read().clone();

        for factory in snapshot {
            let driver = factory.create(request);
            if !driver.is_configured() {
                trace!(driver = %factory.name(), "Driver not configured, skipping");
                continue;
            }
            if driver.matches_request() {
                debug!(driver = %driver.name(), "Driver selected for request");
                return Some(driver);
            }
            trace!(driver = %factory.name(), "Driver does not match request");
        }

        None
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    struct HeaderDriver {
        name: &'static str,
        configured: bool,
        seen: bool,
    }

    #[async_trait]
    impl Driver for HeaderDriver {
        fn name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        fn matches_request(&self) -> bool {
            self.seen
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
            _message: OutgoingMessage,
            _in_reply_to: &NormalizedMessage,
            _params: ReplyParams,
        ) -> DriverResult<()> {
            Err(DriverError::delivery(self.name, "offline"))
        }
    }

    fn register(
        registry: &DriverRegistry,
        name: &'static str,
        header: &'static str,
        configured: bool,
    ) {
        registry.register_fn(name, move |req| {
            Box::new(HeaderDriver {
                name,
                configured,
                seen: req.header_value(header).is_some(),
            })
        });
    }

    #[test]
    fn test_select_none_when_empty() {
        let registry = DriverRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.select(&RawRequest::webhook("{}")).is_none());
    }

    #[test]
    fn test_select_first_match_in_priority_order() {
        let registry = DriverRegistry::new();
        register(&registry, "first", "x-shared", true);
        register(&registry, "second", "x-shared", true);

        let req = RawRequest::webhook("{}").header("X-Shared", "1");
        let driver = registry.select(&req).unwrap();
        assert_eq!(driver.name(), "first");
        assert_eq!(registry.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_select_skips_unconfigured() {
        let registry = DriverRegistry::new();
        register(&registry, "broken", "x-shared", false);
        register(&registry, "working", "x-shared", true);

        let req = RawRequest::webhook("{}").header("x-shared", "1");
        assert_eq!(registry.select(&req).unwrap().name(), "working");
    }

    #[test]
    fn test_select_no_match() {
        let registry = DriverRegistry::new();
        register(&registry, "slack", "x-slack-signature", true);

        let req = RawRequest::webhook("{}").header("x-telegram", "1");
        assert!(registry.select(&req).is_none());
    }

    #[tokio::test]
    async fn test_default_user_exposes_sender_id() {
        let driver = HeaderDriver {
            name: "bare",
            configured: true,
            seen: true,
        };
        let user = driver
            .user(&NormalizedMessage::new("hi", "U42", "C1"))
            .await
            .unwrap();

        assert_eq!(user.id(), "U42");
        assert_eq!(user.get("id"), Some(serde_json::json!("U42")));
        assert_eq!(user.get("username"), None);
    }

    #[test]
    fn test_raw_request_accessors() {
        let req = RawRequest::socket(r#"{"text":"hi"}"#)
            .header("Content-Type", "application/json")
            .query_param("token", "abc");

        assert_eq!(req.source(), RequestSource::Socket);
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        assert_eq!(req.query_value("token"), Some("abc"));
        assert_eq!(req.json().unwrap()["text"], "hi");
        assert!(RawRequest::webhook("not json").json().is_err());
    }
}
