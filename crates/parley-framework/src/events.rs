//! Driver event routing.
//!
//! Events a driver extracts from a payload are named here before any
//! subscriber sees them. A driver may name an event itself; otherwise the
//! router takes the string `type` field of the payload. Events that end up
//! without a name are dropped.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use parley_core::DriverEvent;

use crate::handler::{BoxedHandler, Handler};

/// Payload field used to name an unnamed event.
pub const EVENT_TYPE_FIELD: &str = "type";

/// Subscribers keyed by event name, in registration order.
#[derive(Default)]
pub struct EventRouter {
    subscribers: RwLock<Vec<(String, BoxedHandler)>>,
}

impl EventRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to events named `name`.
    pub fn on<H: Handler>(&self, name: impl Into<String>, handler: H) {
        let name = name.into();
        debug!(event = %name, "Registered event subscriber");
        self.subscribers.write().push((name, Arc::new(handler)));
    }

    /// Returns the subscribers for `name` in registration order.
    pub fn subscribers_for(&self, name: &str) -> Vec<BoxedHandler> {
        self.subscribers
            .read()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    /// Returns `true` if no subscriber is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Ensures `event` has a name, assigning one from its payload if needed.
    ///
    /// Returns `None` if no name can be found.
    pub fn name_event(&self, event: &DriverEvent) -> Option<String> {
        if let Some(name) = event.name() {
            return Some(name.to_string());
        }

        let Some(name) = event
            .payload()
            .get(EVENT_TYPE_FIELD)
            .and_then(|v| v.as_str())
        else {
            warn!("Dropping driver event without a name");
            return None;
        };

        if let Err(e) = event.assign_name(name) {
            warn!(error = %e, "Event name already assigned");
        }
        event.name().map(str::to_string)
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .subscribers
            .read()
            .iter()
            .map(|(n, _)| n.clone())
            .collect();
        f.debug_struct("EventRouter")
            .field("subscribers", &names)
            .finish()
    }
}
