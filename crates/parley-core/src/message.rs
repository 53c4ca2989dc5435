//! Message types shared by every driver.
//!
//! This module provides the platform-independent message model:
//! - [`NormalizedMessage`]: one inbound chat message
//! - [`Answer`]: a reply the bot was waiting for inside a conversation
//! - [`OutgoingMessage`] and [`Question`]: what a driver is asked to send
//!
//! Drivers translate their platform payloads into these types, so the matcher
//! and handlers never see platform-specific structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open parameter bag passed through to a driver on every reply.
///
/// The recognized keys are entirely platform-defined (attachments, thread
/// references, ...). The core never interprets them.
pub type ReplyParams = Map<String, Value>;

// ============================================================================
// Normalized Message
// ============================================================================

/// A single inbound chat message in platform-independent form.
///
/// Immutable after construction; two messages are equal when all their fields
/// are equal.
///
/// # Example
///
/// ```rust
/// use parley_core::NormalizedMessage;
///
/// let msg = NormalizedMessage::new("hello", "U123", "C456");
/// assert_eq!(msg.text(), "hello");
/// assert!(!msg.is_from_bot());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    text: String,
    sender_id: String,
    recipient_id: String,
    #[serde(default)]
    is_from_bot: bool,
    #[serde(default)]
    payload: Value,
}

impl NormalizedMessage {
    /// Creates a message sent by a regular user.
    pub fn new(
        text: impl Into<String>,
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            is_from_bot: false,
            payload: Value::Null,
        }
    }

    /// Marks whether the message originated from the bot itself.
    pub fn from_bot(mut self, is_from_bot: bool) -> Self {
        self.is_from_bot = is_from_bot;
        self
    }

    /// Attaches the original platform payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the id of the user who sent the message.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Returns the id of the channel or user the message was addressed to.
    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    /// Returns `true` if the bot itself sent this message.
    pub fn is_from_bot(&self) -> bool {
        self.is_from_bot
    }

    /// Returns the original platform payload (`Null` if none was attached).
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

// ============================================================================
// Conversation Answer
// ============================================================================

/// An answer to a question the bot asked earlier.
///
/// Interactive replies (button presses) carry the selected button's `value`;
/// plain text replies leave it empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    text: String,
    value: Option<String>,
    callback_id: Option<String>,
    interactive: bool,
}

impl Answer {
    /// Creates a plain text answer.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the selected value and marks the answer as interactive.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self.interactive = true;
        self
    }

    /// Sets the callback id of the question this answer belongs to.
    pub fn with_callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    /// Returns the answer text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the selected value, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the callback id, if any.
    pub fn callback_id(&self) -> Option<&str> {
        self.callback_id.as_deref()
    }

    /// Returns `true` for button/menu replies.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}

// ============================================================================
// Outgoing Messages
// ============================================================================

/// A button offered as part of a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Label shown to the user.
    pub text: String,
    /// Value reported back when pressed.
    pub value: String,
}

impl Button {
    /// Creates a button whose value equals its label.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: text.clone(),
            text,
        }
    }

    /// Overrides the reported value.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

/// A structured question with optional buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question text.
    pub text: String,
    /// Identifier echoed back in the [`Answer`].
    pub callback_id: Option<String>,
    /// Text shown by platforms that cannot render buttons.
    pub fallback: Option<String>,
    /// Offered buttons, in display order.
    pub buttons: Vec<Button>,
}

impl Question {
    /// Creates a question without buttons.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_id: None,
            fallback: None,
            buttons: Vec::new(),
        }
    }

    /// Sets the callback id.
    pub fn callback_id(mut self, id: impl Into<String>) -> Self {
        self.callback_id = Some(id.into());
        self
    }

    /// Sets the fallback text.
    pub fn fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Appends a button.
    pub fn button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }
}

/// What a driver is asked to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Plain text.
    Text(String),
    /// A structured question.
    Question(Question),
}

impl OutgoingMessage {
    /// Returns the text shown to the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Question(question) => &question.text,
        }
    }
}

impl From<&str> for OutgoingMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for OutgoingMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Question> for OutgoingMessage {
    fn from(question: Question) -> Self {
        Self::Question(question)
    }
}
