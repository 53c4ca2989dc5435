//! Time-bounded key/value cache.
//!
//! Conversation state and user information are short-lived: they are stored
//! with an expiry and vanish once it passes. [`TtlCache`] is the contract the
//! rest of the crate depends on; backends are swappable behind it.
//!
//! # Semantics
//!
//! - Expiry is checked on read: an expired entry behaves as absent even if it
//!   has not been physically removed yet.
//! - [`pull`](TtlCache::pull) is an atomic read-then-delete. Two concurrent
//!   pulls of the same key never both observe the value.
//! - [`put`](TtlCache::put) overwrites and resets the expiry.
//!
//! [`InMemoryCache`] is the bundled implementation. It purges lazily on read;
//! [`InMemoryCache::purge_expired`] allows eager sweeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

use crate::error::CacheResult;

// =============================================================================
// Expiry
// =============================================================================

/// When a cache entry expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expire after a duration measured from the time of the write.
    After(Duration),
    /// Expire at an absolute instant.
    At(Instant),
}

impl Expiry {
    /// Expire after `minutes` minutes, saturating at [`Duration::MAX`].
    pub fn minutes(minutes: u64) -> Self {
        Self::After(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Resolves the absolute expiry instant for a write happening at `now`.
    ///
    /// Returns `None` when the lifetime reaches past the clock's range; such
    /// an entry never expires.
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Self::After(ttl) => now.checked_add(ttl),
            Self::At(at) => Some(at),
        }
    }
}

impl From<Duration> for Expiry {
    fn from(ttl: Duration) -> Self {
        Self::After(ttl)
    }
}

impl From<Instant> for Expiry {
    fn from(at: Instant) -> Self {
        Self::At(at)
    }
}

// =============================================================================
// Cache Contract
// =============================================================================

/// Key/value store with per-entry expiry.
///
/// Implementations must be safe under concurrent access and must make
/// [`pull`](Self::pull) atomic.
#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Returns `true` if a live (unexpired) entry exists for `key`.
    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns the live value for `key`.
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Removes and returns the live value for `key`.
    async fn pull(&self, key: &str) -> CacheResult<Option<Value>>;

    /// Inserts or overwrites `key`, resetting its expiry.
    async fn put(&self, key: &str, value: Value, expiry: Expiry) -> CacheResult<()>;

    /// Removes `key`. Returns `true` if a live entry was removed.
    async fn forget(&self, key: &str) -> CacheResult<bool> {
        Ok(self.pull(key).await?.is_some())
    }

    /// Returns the value for `key`, or `default` if absent or expired.
    async fn get_or(&self, key: &str, default: Value) -> CacheResult<Value> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Pulls the value for `key`, or returns `default` if absent or expired.
    async fn pull_or(&self, key: &str, default: Value) -> CacheResult<Value> {
        Ok(self.pull(key).await?.unwrap_or(default))
    }
}

/// A shared cache trait object.
pub type SharedCache = Arc<dyn TtlCache>;

// =============================================================================
// In-Memory Backend
// =============================================================================

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// In-process [`TtlCache`] backed by a mutex-guarded map.
///
/// Uses the tokio clock, so tests can pause and advance time.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache wrapped for sharing.
    pub fn shared() -> SharedCache {
        Arc::new(Self::new())
    }

    /// Physically removes every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        if removed > 0 {
            trace!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Returns the number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn live_value(&self, key: &str, remove: bool) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let live = entries.get(key).map(|e| e.is_live(now))?;
        if !live {
            entries.remove(key);
            return None;
        }

        if remove {
            entries.remove(key).map(|e| e.value)
        } else {
            entries.get(key).map(|e| e.value.clone())
        }
    }
}

#[async_trait]
impl TtlCache for InMemoryCache {
    async fn has(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .get(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.live_value(key, false))
    }

    async fn pull(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.live_value(key, true))
    }

    async fn put(&self, key: &str, value: Value, expiry: Expiry) -> CacheResult<()> {
        let expires_at = expiry.deadline(Instant::now());
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}
