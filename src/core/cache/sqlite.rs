//! SQLite-backed response cache.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::{CacheEntry, CacheStore};
use crate::core::client::constants::{CACHE_APP_DIR, DEFAULT_CACHE_DB};
use crate::core::clock::{Clock, SystemClock};
use crate::core::{CacheKey, NumistaError};

/// Durable cache in a single SQLite file. Survives process restarts.
///
/// Rows are written with `INSERT OR REPLACE` under one connection mutex, so a
/// concurrent reader sees either the old row or the new one.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    status INTEGER NOT NULL,
    body BLOB NOT NULL,
    stored_at_ms INTEGER NOT NULL,
    ttl_ms INTEGER NOT NULL,
    expires_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_expires
    ON response_cache(expires_at_ms);
";

impl SqliteCache {
    /// Opens (or creates) the cache database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NumistaError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens the cache in `dir` under the default file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open_in_dir(dir: impl AsRef<Path>) -> Result<Self, NumistaError> {
        Self::open(dir.as_ref().join(DEFAULT_CACHE_DB))
    }

    /// Opens the cache at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined or opened.
    pub fn open_default() -> Result<Self, NumistaError> {
        Self::open_in_dir(Self::default_dir()?)
    }

    /// An in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn in_memory() -> Result<Self, NumistaError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Replaces the clock used for expiry checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The platform cache directory for this crate.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Config`] if neither a cache nor a home directory exists.
    pub fn default_dir() -> Result<PathBuf, NumistaError> {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
            .map(|p| p.join(CACHE_APP_DIR))
            .ok_or_else(|| NumistaError::Config("could not determine a cache directory".into()))
    }

    fn from_connection(conn: Connection) -> Result<Self, NumistaError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for SqliteCache {
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, NumistaError> {
        let now_ms = self.clock.now().timestamp_millis();
        let row: Option<(i64, Vec<u8>, i64, i64)> = self
            .conn()
            .query_row(
                "SELECT status, body, stored_at_ms, ttl_ms FROM response_cache
                 WHERE cache_key = ?1 AND expires_at_ms > ?2",
                params![key.as_str(), now_ms],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((status, body, stored_at_ms, ttl_ms)) = row else {
            return Ok(None);
        };

        let status = u16::try_from(status)
            .map_err(|_| NumistaError::Data(format!("cached status out of range: {status}")))?;
        let stored_at = DateTime::<Utc>::from_timestamp_millis(stored_at_ms)
            .ok_or_else(|| NumistaError::Data(format!("cached timestamp out of range: {stored_at_ms}")))?;
        let ttl = Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0));

        Ok(Some(CacheEntry {
            key: key.clone(),
            status,
            body,
            stored_at,
            ttl,
        }))
    }

    fn store(&self, entry: CacheEntry) -> Result<(), NumistaError> {
        if entry.ttl.is_zero() {
            return Ok(());
        }
        let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = entry.expires_at().timestamp_millis();

        self.conn().execute(
            "INSERT OR REPLACE INTO response_cache
                 (cache_key, status, body, stored_at_ms, ttl_ms, expires_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.key.as_str(),
                entry.status,
                entry.body,
                entry.stored_at.timestamp_millis(),
                ttl_ms,
                expires_at_ms
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<bool, NumistaError> {
        let n = self.conn().execute(
            "DELETE FROM response_cache WHERE cache_key = ?1",
            params![key.as_str()],
        )?;
        Ok(n > 0)
    }

    fn clear(&self) -> Result<(), NumistaError> {
        self.conn().execute("DELETE FROM response_cache", [])?;
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, NumistaError> {
        let now_ms = self.clock.now().timestamp_millis();
        let n = self.conn().execute(
            "DELETE FROM response_cache WHERE expires_at_ms <= ?1",
            params![now_ms],
        )?;
        Ok(n)
    }
}
