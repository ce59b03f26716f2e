//! Response cache stores.
//!
//! A [`CacheStore`] maps a [`CacheKey`] to the last successful response for it.
//! Entries expire lazily: `lookup` reports an entry whose `stored_at + ttl`
//! has passed as absent, and the next `store` for that key replaces it.
//! Stores never merge entries; every write replaces the whole row atomically.

mod memory;
mod sqlite;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::{CacheKey, NumistaError};

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// One cached response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Digest of the request this response belongs to.
    pub key: CacheKey,
    /// HTTP status of the stored response.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// When the response was stored.
    pub stored_at: DateTime<Utc>,
    /// How long the entry stays valid after `stored_at`.
    pub ttl: Duration,
}

impl CacheEntry {
    /// The instant after which the entry must no longer be served.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.stored_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// `stored_at + ttl <= now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }
}

/// Key/value storage for cached responses.
///
/// Implementations must be safe to share between concurrent calls and must
/// never hand out an expired entry from [`CacheStore::lookup`]. Entries with a
/// zero TTL are not stored.
pub trait CacheStore: Send + Sync {
    /// Returns the live entry for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, NumistaError>;

    /// Inserts `entry`, replacing any previous entry for the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store(&self, entry: CacheEntry) -> Result<(), NumistaError>;

    /// Removes the entry for `key`, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &CacheKey) -> Result<bool, NumistaError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<(), NumistaError>;

    /// Deletes expired entries, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn purge_expired(&self) -> Result<usize, NumistaError>;
}

/// Storage that doesn't cache anything.
/// Used when the cache TTL is zero: lookups always miss, stores are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl CacheStore for NoopCache {
    fn lookup(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, NumistaError> {
        Ok(None)
    }

    fn store(&self, _entry: CacheEntry) -> Result<(), NumistaError> {
        Ok(())
    }

    fn remove(&self, _key: &CacheKey) -> Result<bool, NumistaError> {
        Ok(false)
    }

    fn clear(&self) -> Result<(), NumistaError> {
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, NumistaError> {
        Ok(0)
    }
}
