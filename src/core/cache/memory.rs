use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::{CacheEntry, CacheStore};
use crate::core::clock::{Clock, SystemClock};
use crate::core::{CacheKey, NumistaError};

/// Process-local cache. Entries are lost when the process exits.
#[derive(Debug)]
pub struct MemoryCache {
    map: RwLock<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an empty cache on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache that measures expiry with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, NumistaError> {
        let now = self.clock.now();
        let guard = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned())
    }

    fn store(&self, entry: CacheEntry) -> Result<(), NumistaError> {
        if entry.ttl.is_zero() {
            return Ok(());
        }
        let mut guard = self.map.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool, NumistaError> {
        let mut guard = self.map.write().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), NumistaError> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, NumistaError> {
        let now = self.clock.now();
        let mut guard = self.map.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - guard.len())
    }
}
