//! Centralized constants for default endpoints, headers and pipeline tuning.

/// `User-Agent` sent with every request.
pub(crate) const USER_AGENT: &str = concat!("numista-rs/", env!("CARGO_PKG_VERSION"));

/// Numista API v3 base (paths are appended).
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.numista.com/v3";

/// Header carrying the API key.
pub(crate) const API_KEY_HEADER: &str = "Numista-API-Key";

/// Per-request timeout, in seconds.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cache TTL, in seconds (7 days).
pub(crate) const DEFAULT_CACHE_TTL_SECS: u64 = 604_800;

/// Subdirectory of the platform cache dir holding the database.
pub(crate) const CACHE_APP_DIR: &str = "numista-rs";

/// File name of the cache database.
pub(crate) const DEFAULT_CACHE_DB: &str = "http_cache.db";

/// Admissions allowed per rate-limit window.
pub(crate) const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 45;

/// Length of the rate-limit window, in seconds.
pub(crate) const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Total attempts per logical call, the first one included.
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// First backoff delay, in milliseconds.
pub(crate) const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Backoff cap, in milliseconds.
pub(crate) const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;

/// Backoff growth factor per attempt.
pub(crate) const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Marker for responses served from the cache.
pub(crate) const CACHE_HIT_ICON: &str = "💾";

/// Marker for responses fetched over the network.
pub(crate) const CACHE_MISS_ICON: &str = "🌐";
