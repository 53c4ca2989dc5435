//! Platform user information.
//!
//! Drivers wrap their own user type in a [`UserInfo`], which exposes a uniform
//! named-attribute lookup. Attribute resolution follows a fixed three-step order:
//!
//! 1. a registered **getter** for the name (the platform's `get_<name>` accessor)
//! 2. a registered **flag** for the name (the platform's `is_<name>` accessor)
//! 3. the **raw field** of that name in the user's serialized form
//!
//! The first step that exists wins, even if its value is `null`. If none
//! exists, the lookup yields `None`.
//!
//! Accessors are declared once per user type through an [`AccessorTable`]:
//!
//! ```rust
//! use std::sync::OnceLock;
//! use parley_core::{AccessorTable, PlatformUser, UserInfo};
//! use serde::Serialize;
//! use serde_json::json;
//!
//! #[derive(Serialize)]
//! struct ChatUser {
//!     id: u64,
//!     handle: String,
//!     admin: bool,
//! }
//!
//! impl PlatformUser for ChatUser {
//!     fn id(&self) -> String {
//!         self.id.to_string()
//!     }
//!
//!     fn accessors() -> &'static AccessorTable<Self> {
//!         static TABLE: OnceLock<AccessorTable<ChatUser>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             AccessorTable::<ChatUser>::new()
//!                 .getter("handle", |u| json!(format!("@{}", u.handle)))
//!                 .flag("admin", |u| u.admin)
//!         })
//!     }
//! }
//!
//! let info = UserInfo::new(ChatUser { id: 7, handle: "ada".into(), admin: true });
//! assert_eq!(info.get("handle"), Some(json!("@ada")));
//! assert_eq!(info.get("admin"), Some(json!(true)));
//! assert_eq!(info.get("id"), Some(json!(7)));
//! assert_eq!(info.get("missing"), None);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Getter accessor: returns the attribute value.
pub type Getter<U> = fn(&U) -> Value;

/// Flag accessor: returns a boolean attribute.
pub type Flag<U> = fn(&U) -> bool;

// ============================================================================
// Accessor Table
// ============================================================================

/// Named accessors declared for one platform user type.
///
/// Built once per type (usually inside a `OnceLock`) and shared by every
/// [`UserInfo`] wrapping that type.
pub struct AccessorTable<U> {
    getters: HashMap<&'static str, Getter<U>>,
    flags: HashMap<&'static str, Flag<U>>,
}

impl<U> Default for AccessorTable<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> AccessorTable<U> {
    /// Creates an empty table; every lookup falls through to raw fields.
    pub fn new() -> Self {
        Self {
            getters: HashMap::new(),
            flags: HashMap::new(),
        }
    }

    /// Declares a getter for `name`.
    pub fn getter(mut self, name: &'static str, getter: Getter<U>) -> Self {
        self.getters.insert(name, getter);
        self
    }

    /// Declares a boolean flag for `name`.
    pub fn flag(mut self, name: &'static str, flag: Flag<U>) -> Self {
        self.flags.insert(name, flag);
        self
    }

    /// Resolves `name` against `user`, falling back to `raw` fields.
    pub fn resolve(&self, user: &U, raw: &Map<String, Value>, name: &str) -> Option<Value> {
        if let Some(getter) = self.getters.get(name) {
            return Some(getter(user));
        }
        if let Some(flag) = self.flags.get(name) {
            return Some(Value::Bool(flag(user)));
        }
        raw.get(name).cloned()
    }

    /// Evaluates every declared accessor, flags first so getters take priority.
    fn evaluate_into(&self, user: &U, out: &mut Map<String, Value>) {
        for (name, flag) in &self.flags {
            out.insert((*name).to_string(), Value::Bool(flag(user)));
        }
        for (name, getter) in &self.getters {
            out.insert((*name).to_string(), getter(user));
        }
    }
}

impl<U> fmt::Debug for AccessorTable<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorTable")
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("flags", &self.flags.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Platform User
// ============================================================================

/// A platform-specific user object that can be wrapped in a [`UserInfo`].
///
/// The serialized form of the user provides the raw fields used as the last
/// step of attribute resolution.
pub trait PlatformUser: Serialize + Send + Sync + 'static {
    /// Returns the platform user id.
    fn id(&self) -> String;

    /// Returns the user's handle, if the platform has one.
    fn username(&self) -> Option<String> {
        None
    }

    /// Returns the user's first name.
    fn first_name(&self) -> Option<String> {
        None
    }

    /// Returns the user's last name.
    fn last_name(&self) -> Option<String> {
        None
    }

    /// Returns the accessor table shared by all users of this type.
    fn accessors() -> &'static AccessorTable<Self>
    where
        Self: Sized;
}

/// Object-safe view over a wrapped user.
trait AttributeSource: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Value>;
    fn evaluate(&self) -> Map<String, Value>;
}

struct Wrapped<U> {
    user: U,
    raw: Map<String, Value>,
}

impl<U: PlatformUser> AttributeSource for Wrapped<U> {
    fn resolve(&self, name: &str) -> Option<Value> {
        U::accessors().resolve(&self.user, &self.raw, name)
    }

    fn evaluate(&self) -> Map<String, Value> {
        let mut out = self.raw.clone();
        U::accessors().evaluate_into(&self.user, &mut out);
        out
    }
}

/// Attributes restored from a [`UserSnapshot`], already in resolution order.
struct Resolved(Map<String, Value>);

impl AttributeSource for Resolved {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }

    fn evaluate(&self) -> Map<String, Value> {
        self.0.clone()
    }
}

// ============================================================================
// UserInfo
// ============================================================================

/// Read-only view over a platform user.
///
/// Cheap to clone. Cache it by id through a [`UserSnapshot`], never by
/// reference.
#[derive(Clone)]
pub struct UserInfo {
    id: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    raw: Value,
    source: Arc<dyn AttributeSource>,
}

impl UserInfo {
    /// Wraps a platform user.
    pub fn new<U: PlatformUser>(user: U) -> Self {
        let raw = match serde_json::to_value(&user) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                warn!(error = %e, user_id = %user.id(), "Failed to serialize user, raw fields unavailable");
                Map::new()
            }
        };

        Self {
            id: user.id(),
            username: user.username(),
            first_name: user.first_name(),
            last_name: user.last_name(),
            raw: Value::Object(raw.clone()),
            source: Arc::new(Wrapped { user, raw }),
        }
    }

    /// Restores a user from a cached snapshot.
    pub fn from_snapshot(snapshot: UserSnapshot) -> Self {
        Self {
            id: snapshot.id,
            username: snapshot.username,
            first_name: snapshot.first_name,
            last_name: snapshot.last_name,
            raw: Value::Object(snapshot.info),
            source: Arc::new(Resolved(snapshot.attributes)),
        }
    }

    /// Looks up a named attribute (getter, then flag, then raw field).
    pub fn get(&self, name: &str) -> Option<Value> {
        self.source.resolve(name)
    }

    /// Returns the platform user id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the user's handle.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the user's first name.
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    /// Returns the user's last name.
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Returns the raw serialized user object.
    pub fn info(&self) -> &Value {
        &self.raw
    }

    /// Captures every resolvable attribute into a serializable snapshot.
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            info: match &self.raw {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            },
            attributes: self.source.evaluate(),
        }
    }
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Serializable form of a [`UserInfo`], stored in the user-info cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Raw serialized user.
    #[serde(default)]
    pub info: Map<String, Value>,
    /// Every attribute with accessors already applied.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl UserSnapshot {
    /// Creates a snapshot carrying only an id, also exposed as the `id` field.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::String(id.clone()));
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            info: fields.clone(),
            attributes: fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::OnceLock;

    /// A user where `name` exists as getter, flag and raw field.
    #[derive(Serialize)]
    struct Contested {
        id: String,
        name: String,
        verified: bool,
        color: String,
    }

    impl PlatformUser for Contested {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn username(&self) -> Option<String> {
            Some(self.name.clone())
        }

        fn accessors() -> &'static AccessorTable<Self> {
            static TABLE: OnceLock<AccessorTable<Contested>> = OnceLock::new();
            TABLE.get_or_init(|| {
                AccessorTable::<Contested>::new()
                    .getter("name", |u| json!(u.name.to_uppercase()))
                    .flag("name", |_| false)
                    .flag("verified", |u| !u.verified)
                    .getter("nothing", |_| Value::Null)
            })
        }
    }

    fn contested() -> Contested {
        Contested {
            id: "U1".into(),
            name: "ada".into(),
            verified: true,
            color: "teal".into(),
        }
    }

    #[test]
    fn test_getter_beats_flag_and_raw() {
        let info = UserInfo::new(contested());
        assert_eq!(info.get("name"), Some(json!("ADA")));
    }

    #[test]
    fn test_flag_beats_raw() {
        let info = UserInfo::new(contested());
        assert_eq!(info.info()["verified"], json!(true));
        assert_eq!(info.get("verified"), Some(json!(false)));
    }

    #[test]
    fn test_flag_beats_raw_after_snapshot() {
        let snapshot = UserInfo::new(contested()).snapshot();
        let round: UserSnapshot =
            serde_json::from_value(serde_json::to_value(&snapshot).unwrap()).unwrap();
        let restored = UserInfo::from_snapshot(round);

        assert_eq!(restored.info()["verified"], json!(true));
        assert_eq!(restored.get("verified"), Some(json!(false)));
    }

    #[test]
    fn test_id_only_snapshot_answers_id() {
        let restored = UserInfo::from_snapshot(UserSnapshot::new("U9"));
        assert_eq!(restored.id(), "U9");
        assert_eq!(restored.get("id"), Some(json!("U9")));
        assert_eq!(restored.info()["id"], json!("U9"));
        assert_eq!(restored.get("name"), None);
    }

    #[test]
    fn test_raw_field_fallback() {
        let info = UserInfo::new(contested());
        assert_eq!(info.get("color"), Some(json!("teal")));
    }

    #[test]
    fn test_missing_attribute_is_none() {
        let info = UserInfo::new(contested());
        assert_eq!(info.get("shoe_size"), None);
    }

    #[test]
    fn test_existing_getter_returning_null_wins() {
        let info = UserInfo::new(contested());
        assert_eq!(info.get("nothing"), Some(Value::Null));
    }

    #[test]
    fn test_snapshot_preserves_resolution() {
        let info = UserInfo::new(contested());
        let snapshot = info.snapshot();
        let restored = UserInfo::from_snapshot(snapshot.clone());

        assert_eq!(restored.id(), "U1");
        assert_eq!(restored.username(), Some("ada"));
        assert_eq!(restored.get("name"), Some(json!("ADA")));
        assert_eq!(restored.get("verified"), Some(json!(false)));
        assert_eq!(restored.get("color"), Some(json!("teal")));
        assert_eq!(restored.get("shoe_size"), None);

        let round: UserSnapshot =
            serde_json::from_value(serde_json::to_value(&snapshot).unwrap()).unwrap();
        assert_eq!(round, snapshot);
    }
}
