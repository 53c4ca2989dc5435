//! Namespaced state stores on top of a [`TtlCache`].
//!
//! Two lifetimes of state share one cache backend:
//!
//! | Store | Key | Default TTL |
//! |-------|-----|-------------|
//! | [`ConversationStore`] | `conversation:<driver>:<sender>:<recipient>` | 40 minutes |
//! | [`UserInfoCache`] | `user:<driver>:<user id>` | 30 minutes |
//!
//! The prefixes keep the namespaces apart; the physical storage format is
//! up to the backend.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use parley_core::{
    CacheResult, Driver, DriverResult, Expiry, NormalizedMessage, SharedCache,
    UserInfo, UserSnapshot,
};

use crate::error::DispatchError;

/// Key prefix for conversation state.
pub const CONVERSATION_PREFIX: &str = "conversation";

/// Key prefix for cached user information.
pub const USER_PREFIX: &str = "user";

/// Default lifetime of conversation state.
pub const DEFAULT_CONVERSATION_TTL: Duration = Duration::from_secs(40 * 60);

/// Default lifetime of cached user information.
pub const DEFAULT_USER_TTL: Duration = Duration::from_secs(30 * 60);

// =============================================================================
// Conversation State
// =============================================================================

/// Stores in-progress conversation state per driver, sender and recipient.
#[derive(Clone)]
pub struct ConversationStore {
    cache: SharedCache,
    ttl: Duration,
}

impl ConversationStore {
    /// Creates a store with the default 40 minute lifetime.
    pub fn new(cache: SharedCache) -> Self {
        Self::with_ttl(cache, DEFAULT_CONVERSATION_TTL)
    }

    /// Creates a store with a custom lifetime.
    pub fn with_ttl(cache: SharedCache, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the configured lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cache key for a conversation.
    pub fn key(driver: &str, message: &NormalizedMessage) -> String {
        format!(
            "{CONVERSATION_PREFIX}:{driver}:{}:{}",
            message.sender_id(),
            message.recipient_id()
        )
    }

    /// Saves `state`, replacing any previous state and resetting its lifetime.
    pub async fn save<T: Serialize>(
        &self,
        driver: &str,
        message: &NormalizedMessage,
        state: &T,
    ) -> CacheResult<()> {
        let key = Self::key(driver, message);
        let value = serde_json::to_value(state)?;
        self.cache.put(&key, value, Expiry::After(self.ttl)).await?;
        trace!(%key, "Saved conversation state");
        Ok(())
    }

    /// Loads the current state without removing it.
    pub async fn load<T: DeserializeOwned>(
        &self,
        driver: &str,
        message: &NormalizedMessage,
    ) -> CacheResult<Option<T>> {
        let key = Self::key(driver, message);
        match self.cache.get(&key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Removes and returns the current state.
    pub async fn take<T: DeserializeOwned>(
        &self,
        driver: &str,
        message: &NormalizedMessage,
    ) -> CacheResult<Option<T>> {
        let key = Self::key(driver, message);
        match self.cache.pull(&key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` if a live conversation exists.
    pub async fn exists(&self, driver: &str, message: &NormalizedMessage) -> CacheResult<bool> {
        self.cache.has(&Self::key(driver, message)).await
    }

    /// Drops the conversation.
    pub async fn forget(&self, driver: &str, message: &NormalizedMessage) -> CacheResult<bool> {
        self.cache.forget(&Self::key(driver, message)).await
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// User Information
// =============================================================================

/// Caches user information by driver and user id.
#[derive(Clone)]
pub struct UserInfoCache {
    cache: SharedCache,
    ttl: Duration,
}

impl UserInfoCache {
    /// Creates a cache with the default 30 minute lifetime.
    pub fn new(cache: SharedCache) -> Self {
        Self::with_ttl(cache, DEFAULT_USER_TTL)
    }

    /// Creates a cache with a custom lifetime.
    pub fn with_ttl(cache: SharedCache, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the configured lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cache key for a user.
    pub fn key(driver: &str, user_id: &str) -> String {
        format!("{USER_PREFIX}:{driver}:{user_id}")
    }

    /// Returns the cached user, if present and unexpired.
    pub async fn get(&self, driver: &str, user_id: &str) -> CacheResult<Option<UserInfo>> {
        match self.cache.get(&Self::key(driver, user_id)).await? {
            Some(value) => {
                let snapshot: UserSnapshot = serde_json::from_value(value)?;
                Ok(Some(UserInfo::from_snapshot(snapshot)))
            }
            None => Ok(None),
        }
    }

    /// Stores a user snapshot.
    pub async fn put(&self, driver: &str, user: &UserInfo) -> CacheResult<()> {
        let value = serde_json::to_value(user.snapshot())?;
        self.cache
            .put(&Self::key(driver, user.id()), value, Expiry::After(self.ttl))
            .await
    }

    /// Returns the sender of `message`, asking the driver only on a cache miss.
    pub async fn resolve(
        &self,
        driver: &dyn Driver,
        message: &NormalizedMessage,
    ) -> Result<UserInfo, DispatchError> {
        if let Some(user) = self.get(driver.name(), message.sender_id()).await? {
            trace!(user_id = %message.sender_id(), "User info cache hit");
            return Ok(user);
        }

        let user = fetch_user(driver, message).await?;
        self.put(driver.name(), &user).await?;
        debug!(driver = %driver.name(), user_id = %user.id(), "Cached user info");
        Ok(user)
    }
}

async fn fetch_user(driver: &dyn Driver, message: &NormalizedMessage) -> DriverResult<UserInfo> {
    driver.user(message).await
}

impl std::fmt::Debug for UserInfoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInfoCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{InMemoryCache, TtlCache};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Step {
        step: u32,
    }

    fn message() -> NormalizedMessage {
        NormalizedMessage::new("hi", "U42", "C1")
    }

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(
            ConversationStore::key("slack", &message()),
            "conversation:slack:U42:C1"
        );
        assert_eq!(UserInfoCache::key("slack", "U42"), "user:slack:U42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversation_expires_after_ttl() {
        let store = ConversationStore::new(InMemoryCache::shared());
        store.save("slack", &message(), &Step { step: 1 }).await.unwrap();

        let loaded: Option<Step> = store.load("slack", &message()).await.unwrap();
        assert_eq!(loaded, Some(Step { step: 1 }));

        tokio::time::advance(Duration::from_secs(41 * 60)).await;
        let loaded: Option<Step> = store.load("slack", &message()).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_conversation_take_removes() {
        let store = ConversationStore::new(InMemoryCache::shared());
        store.save("slack", &message(), &Step { step: 2 }).await.unwrap();

        let taken: Option<Step> = store.take("slack", &message()).await.unwrap();
        assert_eq!(taken, Some(Step { step: 2 }));
        assert!(!store.exists("slack", &message()).await.unwrap());
    }

    #[tokio::test]
    async fn test_namespaces_do_not_collide() {
        let cache: SharedCache = Arc::new(InMemoryCache::new());
        let conversations = ConversationStore::new(Arc::clone(&cache));
        let users = UserInfoCache::new(Arc::clone(&cache));

        conversations
            .save("slack", &message(), &Step { step: 3 })
            .await
            .unwrap();
        users
            .put("slack", &UserInfo::from_snapshot(UserSnapshot::new("U42")))
            .await
            .unwrap();

        assert!(cache.has("conversation:slack:U42:C1").await.unwrap());
        assert!(cache.has("user:slack:U42").await.unwrap());
        assert_eq!(users.get("slack", "U42").await.unwrap().unwrap().id(), "U42");
        assert!(users.get("telegram", "U42").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_cache_default_ttl() {
        let users = UserInfoCache::new(InMemoryCache::shared());
        users
            .put("slack", &UserInfo::from_snapshot(UserSnapshot::new("U1")))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        assert!(users.get("slack", "U1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(users.get("slack", "U1").await.unwrap().is_none());
    }
}
