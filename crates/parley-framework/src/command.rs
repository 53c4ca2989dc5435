//! Command registry and matcher.
//!
//! A [`Command`] pairs a regex pattern with a [`CommandHandler`]. Commands
//! are tried in registration order and the first one whose pattern matches
//! the whole message text wins. There is no specificity heuristic.
//!
//! # Pattern Rules
//!
//! - The pattern must match the entire text. A single trailing space in the
//!   text is tolerated.
//! - Matching is case-insensitive. `(?-i)` inside a pattern turns case
//!   sensitivity back on.
//! - `{name}` is shorthand for the named group `(?P<name>.*)`.
//! - Captures are the pattern's groups in order. A group that did not take
//!   part in the match yields an empty string.
//!
//! # Example
//!
//! ```rust,ignore
//! let commands = CommandRegistry::new();
//! commands.hears("hello", greet)?;
//! commands.register(
//!     Command::new("deploy {service}", deploy)?.only_drivers(["slack"]),
//! );
//! ```

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use parley_core::NormalizedMessage;

use crate::error::{CommandError, CommandResult};
use crate::handler::{BoxedCommandHandler, CommandHandler};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Expands `{name}` placeholders and anchors the pattern.
fn compile(pattern: &str) -> CommandResult<Regex> {
    let expanded = PLACEHOLDER.replace_all(pattern, "(?P<${1}>.*)");
    RegexBuilder::new(&format!("^(?:{expanded}) ?$"))
        .case_insensitive(true)
        .build()
        .map_err(|e| CommandError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

// =============================================================================
// Command
// =============================================================================

/// A registered command: a pattern plus the handler it triggers.
pub struct Command {
    pattern: String,
    regex: Regex,
    handler: BoxedCommandHandler,
    drivers: Vec<String>,
    recipients: Vec<String>,
    name: Option<String>,
}

impl Command {
    /// Compiles `pattern` and binds it to `handler`.
    ///
    /// Fails with [`CommandError::InvalidPattern`] if the pattern is not a
    /// valid regular expression.
    pub fn new<H: CommandHandler>(pattern: impl Into<String>, handler: H) -> CommandResult<Self> {
        let pattern = pattern.into();
        let regex = compile(&pattern)?;
        Ok(Self {
            pattern,
            regex,
            handler: Arc::new(handler),
            drivers: Vec::new(),
            recipients: Vec::new(),
            name: None,
        })
    }

    /// Restricts the command to messages from the named drivers.
    pub fn only_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts the command to messages addressed to the given recipients.
    pub fn only_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = recipients.into_iter().map(Into::into).collect();
        self
    }

    /// Gives the command a display name for logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the pattern as registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the display name, falling back to the pattern.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.pattern)
    }

    /// Returns the handler.
    pub fn handler(&self) -> &BoxedCommandHandler {
        &self.handler
    }

    /// Returns the driver restriction (empty means any driver).
    pub fn drivers(&self) -> &[String] {
        &self.drivers
    }

    /// Returns the recipient restriction (empty means any recipient).
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Returns `true` if the restrictions admit this driver and message.
    ///
    /// A driver-restricted command never applies when the driver is unknown.
    pub fn applies_to(&self, driver: Option<&str>, message: &NormalizedMessage) -> bool {
        if !self.drivers.is_empty() {
            match driver {
                Some(name) if self.drivers.iter().any(|d| d == name) => {}
                _ => return false,
            }
        }
        self.recipients.is_empty()
            || self.recipients.iter().any(|r| r == message.recipient_id())
    }

    /// Matches the pattern against `text`, returning positional and named captures.
    fn captures(&self, text: &str) -> Option<(Vec<String>, HashMap<String, String>)> {
        let caps = self.regex.captures(text)?;

        let positional = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();

        let named = self
            .regex
            .capture_names()
            .flatten()
            .map(|name| {
                let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                (name.to_string(), value.to_string())
            })
            .collect();

        Some((positional, named))
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("pattern", &self.pattern)
            .field("name", &self.name)
            .field("drivers", &self.drivers)
            .field("recipients", &self.recipients)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// The outcome of a successful match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    command: Arc<Command>,
    message: NormalizedMessage,
    captures: Vec<String>,
    named: HashMap<String, String>,
}

impl MatchResult {
    /// Returns the matched command.
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Returns the message that matched.
    pub fn message(&self) -> &NormalizedMessage {
        &self.message
    }

    /// Returns the captured groups in pattern order.
    pub fn captures(&self) -> &[String] {
        &self.captures
    }

    /// Returns a named capture.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Returns all named captures.
    pub fn named_captures(&self) -> &HashMap<String, String> {
        &self.named
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Commands in registration order.
///
/// Registration may happen at any time; matching works on a snapshot taken
/// under the lock, so a match never observes a half-registered command.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<Vec<Arc<Command>>>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn register(&self, command: Command) {
        debug!(command = %command.name(), "Registered command");
        self.commands.write().push(Arc::new(command));
    }

    /// Compiles and appends an unrestricted command.
    pub fn hears<H: CommandHandler>(
        &self,
        pattern: impl Into<String>,
        handler: H,
    ) -> CommandResult<()> {
        self.register(Command::new(pattern, handler)?);
        Ok(())
    }

    /// Returns a snapshot of the registered commands.
    pub fn snapshot(&self) -> Vec<Arc<Command>> {
        self.commands.read().clone()
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    /// Returns `true` if no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Finds the first command matching `message` without a known driver.
    ///
    /// Driver-restricted commands are skipped.
    pub fn find_match(&self, message: &NormalizedMessage) -> Option<MatchResult> {
        self.find_match_for(None, message)
    }

    /// Finds the first command matching `message` as received by `driver`.
    pub fn find_match_for(
        &self,
        driver: Option<&str>,
        message: &NormalizedMessage,
    ) -> Option<MatchResult> {
        let snapshot = self.snapshot();

        for command in snapshot {
            if !command.applies_to(driver, message) {
                trace!(command = %command.name(), "Command restricted, skipping");
                continue;
            }

            if let Some((captures, named)) = command.captures(message.text()) {
                debug!(
                    command = %command.name(),
                    captures = captures.len(),
                    "Command matched"
                );
                return Some(MatchResult {
                    command,
                    message: message.clone(),
                    captures,
                    named,
                });
            }
        }

        trace!(text = %message.text(), "No command matched");
        None
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::error::HandlerResult;

    async fn noop(_ctx: Arc<ExecutionContext>, _captures: Vec<String>) -> HandlerResult {
        Ok(())
    }

    fn msg(text: &str) -> NormalizedMessage {
        NormalizedMessage::new(text, "U1", "C1")
    }

    fn registry_of(patterns: &[&str]) -> CommandRegistry {
        let registry = CommandRegistry::new();
        for pattern in patterns {
            registry.hears(*pattern, noop).unwrap();
        }
        registry
    }

    #[test]
    fn test_first_registered_wins() {
        let registry = registry_of(&["hello", "h.*o"]);
        let result = registry.find_match(&msg("hello")).unwrap();
        assert_eq!(result.command().pattern(), "hello");
        assert!(result.captures().is_empty());

        let registry = registry_of(&["h.*o", "hello"]);
        let result = registry.find_match(&msg("hello")).unwrap();
        assert_eq!(result.command().pattern(), "h.*o");
    }

    #[test]
    fn test_captures_in_order() {
        let registry = registry_of(&[r"remind me (\w+)"]);
        let result = registry.find_match(&msg("remind me tomorrow")).unwrap();
        assert_eq!(result.captures(), ["tomorrow"]);
        assert_eq!(result.message().text(), "remind me tomorrow");
    }

    #[test]
    fn test_full_text_match() {
        let registry = registry_of(&["hello"]);
        assert!(registry.find_match(&msg("hello there")).is_none());
        assert!(registry.find_match(&msg("oh hello")).is_none());
        assert!(registry.find_match(&msg("hello ")).is_some());
        assert!(registry.find_match(&msg("hello  ")).is_none());
    }

    #[test]
    fn test_case_insensitive_by_default() {
        let registry = registry_of(&["hello"]);
        assert!(registry.find_match(&msg("HeLLo")).is_some());

        let strict = registry_of(&["(?-i)hello"]);
        assert!(strict.find_match(&msg("HELLO")).is_none());
        assert!(strict.find_match(&msg("hello")).is_some());
    }

    #[test]
    fn test_empty_text() {
        let registry = registry_of(&["hello"]);
        assert!(registry.find_match(&msg("")).is_none());

        let registry = registry_of(&["(hello)?"]);
        assert!(registry.find_match(&msg("")).is_some());
    }

    #[test]
    fn test_non_participating_group_is_empty() {
        let registry = registry_of(&[r"call (\w+)( now)?"]);
        let result = registry.find_match(&msg("call bob")).unwrap();
        assert_eq!(result.captures(), ["bob", ""]);
    }

    #[test]
    fn test_placeholders_become_named_groups() {
        let registry = registry_of(&["deploy {service} to {env}"]);
        let result = registry.find_match(&msg("deploy api to staging")).unwrap();
        assert_eq!(result.captures(), ["api", "staging"]);
        assert_eq!(result.named("service"), Some("api"));
        assert_eq!(result.named("env"), Some("staging"));
        assert_eq!(result.named("missing"), None);
    }

    #[test]
    fn test_repetition_is_not_a_placeholder() {
        let registry = registry_of(&[r"code (\d{3})"]);
        let result = registry.find_match(&msg("code 123")).unwrap();
        assert_eq!(result.captures(), ["123"]);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let registry = CommandRegistry::new();
        let err = registry.hears("remind (me", noop).unwrap_err();
        assert!(matches!(err, CommandError::InvalidPattern { ref pattern, .. } if pattern == "remind (me"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_driver_restriction() {
        let registry = CommandRegistry::new();
        registry.register(
            Command::new("status", noop)
                .unwrap()
                .only_drivers(["slack"])
                .named("slack-status"),
        );
        registry.hears("status", noop).unwrap();

        let result = registry.find_match_for(Some("slack"), &msg("status")).unwrap();
        assert_eq!(result.command().name(), "slack-status");

        let result = registry.find_match_for(Some("telegram"), &msg("status")).unwrap();
        assert_eq!(result.command().name(), "status");

        let result = registry.find_match(&msg("status")).unwrap();
        assert_eq!(result.command().name(), "status");
    }

    #[test]
    fn test_recipient_restriction() {
        let registry = CommandRegistry::new();
        registry.register(Command::new("ping", noop).unwrap().only_recipients(["C9"]));

        assert!(registry.find_match(&msg("ping")).is_none());
        let addressed = NormalizedMessage::new("ping", "U1", "C9");
        assert!(registry.find_match(&addressed).is_some());
    }
}
