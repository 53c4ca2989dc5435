//! Driver events.
//!
//! Not everything a platform delivers is a chat message: users join channels,
//! reactions get added, buttons are pressed. Drivers surface these as
//! [`DriverEvent`]s carrying an opaque JSON payload.
//!
//! An event is created nameless. The component that routes it to a subscriber
//! assigns its name exactly once; after that the name is fixed.

use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{EventError, EventResult};

/// A named, payload-carrying event raised by a driver.
#[derive(Debug, Clone)]
pub struct DriverEvent {
    name: OnceLock<String>,
    payload: Value,
}

impl DriverEvent {
    /// Creates a nameless event around `payload`.
    pub fn new(payload: Value) -> Self {
        Self {
            name: OnceLock::new(),
            payload,
        }
    }

    /// Creates an event and assigns its name immediately.
    pub fn named(name: impl Into<String>, payload: Value) -> Self {
        let event = Self::new(payload);
        let _ = event.name.set(name.into());
        event
    }

    /// Assigns the event name.
    ///
    /// Fails if a name was already assigned.
    pub fn assign_name(&self, name: impl Into<String>) -> EventResult<()> {
        self.name
            .set(name.into())
            .map_err(|attempted| EventError::NameAlreadyAssigned {
                existing: self.name.get().cloned().unwrap_or_default(),
                attempted,
            })
    }

    /// Returns the assigned name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Returns the opaque payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}
