use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::client::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_MAX_MS, DEFAULT_BASE_URL,
    DEFAULT_CACHE_TTL_SECS, DEFAULT_RATE_LIMIT_PERIOD_SECS, DEFAULT_RATE_LIMIT_REQUESTS,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECS,
};
use crate::core::client::{Backoff, RetryConfig};

/// Plain configuration values for a [`NumistaClient`](crate::NumistaClient).
///
/// How these values are loaded (files, environment, CLI flags) is up to the
/// caller; missing fields take their defaults when deserialized.
///
/// ```
/// # use numista_rs::ClientConfig;
/// let cfg: ClientConfig = serde_json::from_str(r#"{"api_key": "k", "cache_ttl_secs": 0}"#).unwrap();
/// assert_eq!(cfg.rate_limit_requests, 45);
/// assert_eq!(cfg.cache_ttl_secs, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root; request paths are appended to it.
    pub base_url: String,
    /// Value of the `Numista-API-Key` header. Required.
    pub api_key: Option<String>,
    /// OAuth access token for user-scoped endpoints.
    pub bearer_token: Option<String>,
    /// Overall per-request timeout in seconds; 0 disables it.
    pub timeout_secs: u64,
    /// Directory of the persistent cache; `None` uses the platform cache dir.
    pub cache_dir: Option<PathBuf>,
    /// Cache lifetime of a response in seconds; 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Admissions per rate-limit window; 0 disables rate limiting.
    pub rate_limit_requests: u32,
    /// Rate-limit window in seconds.
    pub rate_limit_period_secs: u64,
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,
    /// Growth factor between consecutive backoff delays.
    pub backoff_factor: f64,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff cap in milliseconds (before jitter).
    pub backoff_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            bearer_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_dir: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_period_secs: DEFAULT_RATE_LIMIT_PERIOD_SECS,
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

impl ClientConfig {
    /// The request timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// The cache TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The rate-limit window.
    #[must_use]
    pub const fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_secs)
    }

    /// The retry configuration these values describe (jittered exponential backoff).
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            enabled: self.max_attempts > 1,
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.backoff_base_ms),
                factor: self.backoff_factor,
                max: Duration::from_millis(self.backoff_max_ms),
                jitter: true,
            },
            respect_retry_after: false,
        }
    }
}
