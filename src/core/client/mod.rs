//! Public client surface + builder.
//! Internals are split into `auth` (API key / bearer headers), `constants`
//! (UA + defaults) and `retry` (backoff policy and cache modes).

mod auth;
pub(crate) mod constants;
mod retry;

pub use retry::{Backoff, CacheMode, RetryConfig, RetryPolicy};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::blocking::BlockingClient;
use crate::core::cache::{CacheEntry, CacheStore, MemoryCache, NoopCache, SqliteCache};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::ClientConfig;
use crate::core::limiter::RateLimiter;
use crate::core::models::decode_body;
use crate::core::transport::{HttpTransport, RawResponse, Transport};
use crate::core::{CacheKey, NumistaError, RequestDescriptor, ResponseEnvelope};
use crate::paginate::Paginator;
use auth::Credentials;
use constants::USER_AGENT;

struct Shared {
    transport: Arc<dyn Transport>,
    base_url: Url,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
    limiter: RateLimiter,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

/// Client for the Numista API: every call runs through the cache → rate
/// limiter → retry pipeline.
///
/// Cloning is cheap; clones share the cache store and the rate limiter, so one
/// quota is enforced across all of them.
#[derive(Clone)]
pub struct NumistaClient {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for NumistaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumistaClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("cache_ttl", &self.inner.cache_ttl)
            .field("limiter", &self.inner.limiter)
            .field("retry", self.inner.retry.config())
            .finish_non_exhaustive()
    }
}

impl NumistaClient {
    /// Create a new builder.
    pub fn builder() -> NumistaClientBuilder {
        NumistaClientBuilder::default()
    }

    /// The API root that relative request paths are joined to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Whether responses are cached at all (TTL above zero).
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        !self.inner.cache_ttl.is_zero()
    }

    /// The TTL given to newly stored responses.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.inner.cache_ttl
    }

    /// The default retry configuration.
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        self.inner.retry.config()
    }

    /// The limiter shared by every clone of this client.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Resolves the full URL for `request`, query string included.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Url`] if the result is not a valid URL.
    pub fn url_for(&self, request: &RequestDescriptor) -> Result<Url, NumistaError> {
        let mut url = if request.is_absolute() {
            Url::parse(request.path())?
        } else {
            let base = self.inner.base_url.as_str().trim_end_matches('/');
            let path = request.path().trim_start_matches('/');
            Url::parse(&format!("{base}/{path}"))?
        };
        if !request.query_pairs().is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in request.query_pairs() {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Runs `request` through the pipeline with default cache and retry behavior.
    ///
    /// # Errors
    ///
    /// See [`NumistaClient::execute_with`].
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
    ) -> Result<ResponseEnvelope, NumistaError> {
        self.execute_with(request, CacheMode::Use, None).await
    }

    /// Runs `request` through the pipeline.
    ///
    /// GET requests are looked up in the cache first (unless `cache_mode` says
    /// otherwise); a hit returns immediately without consuming quota. Misses
    /// and mutating requests wait for rate-limiter admission, then go to the
    /// network under the retry policy (`retry_override` replaces the client's
    /// default for this call). Successful GET responses are stored.
    ///
    /// # Errors
    ///
    /// - [`NumistaError::ClientRequest`] for 4xx other than 429, on the first attempt.
    /// - [`NumistaError::RetriesExhausted`] when every attempt hit a transport
    ///   error, a 5xx or a 429.
    /// - [`NumistaError::UnexpectedStatus`] for 1xx and 3xx statuses.
    /// - [`NumistaError::Decode`] if the body is not JSON.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            skip(self, request, retry_override),
            err,
            fields(method = %request.method(), path = %request.path())
        )
    )]
    pub async fn execute_with(
        &self,
        request: &RequestDescriptor,
        cache_mode: CacheMode,
        retry_override: Option<&RetryConfig>,
    ) -> Result<ResponseEnvelope, NumistaError> {
        let shared = &self.inner;
        let url = self.url_for(request)?;
        let key = (request.is_cache_eligible() && cache_mode != CacheMode::Bypass)
            .then(|| request.cache_key_at(&url));

        if cache_mode == CacheMode::Use
            && let Some(key) = &key
            && let Some(envelope) = self.cached_envelope(key)
        {
            return Ok(envelope);
        }

        shared.limiter.acquire().await;

        let override_policy = retry_override.cloned().map(RetryPolicy::new);
        let policy = override_policy.as_ref().unwrap_or(&shared.retry);
        let url_ref = &url;
        let raw = policy
            .run(move |_| self.round_trip(url_ref, request))
            .await?;

        let payload = decode_body(raw.status, &raw.body)?;
        if let Some(key) = key {
            self.cache_store(CacheEntry {
                key,
                status: raw.status,
                body: raw.body,
                stored_at: shared.clock.now(),
                ttl: shared.cache_ttl,
            });
        }

        trace_event!(debug, status = raw.status, "fetched from network");
        Ok(ResponseEnvelope::new(payload, false, raw.status))
    }

    /// Runs `request` and decodes the whole payload into `T`.
    ///
    /// # Errors
    ///
    /// Pipeline errors as in [`NumistaClient::execute`], or
    /// [`NumistaError::Data`] if the payload does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
    ) -> Result<T, NumistaError> {
        self.execute(request).await?.decode()
    }

    /// Lazily walks a paged listing, yielding the elements of `items_key`.
    ///
    /// See [`Paginator`] for the page size and termination options.
    pub fn paginate<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
        items_key: impl Into<String>,
    ) -> Paginator<T> {
        Paginator::new(self.clone(), request, items_key)
    }

    /// A blocking handle sharing this client's cache and rate limiter.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Io`] if the internal runtime cannot be started.
    pub fn blocking(&self) -> Result<BlockingClient, NumistaError> {
        BlockingClient::new(self.clone())
    }

    /// Removes expired cache entries, returning how many were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    pub fn purge_cache(&self) -> Result<usize, NumistaError> {
        self.inner.cache.purge_expired()
    }

    /// Removes every cache entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    pub fn clear_cache(&self) -> Result<(), NumistaError> {
        self.inner.cache.clear()
    }

    /* -------- pipeline internals -------- */

    fn cached_envelope(&self, key: &CacheKey) -> Option<ResponseEnvelope> {
        let entry = match self.inner.cache.lookup(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                trace_event!(debug, key = %key, "cache miss");
                return None;
            }
            Err(_e) => {
                trace_event!(warn, error = %_e, "cache lookup failed; treating as miss");
                return None;
            }
        };

        match decode_body(entry.status, &entry.body) {
            Ok(payload) => {
                trace_event!(debug, key = %key, "cache hit");
                Some(ResponseEnvelope::new(payload, true, entry.status))
            }
            Err(_e) => {
                // unreadable rows are dropped so the network path can replace them
                trace_event!(warn, error = %_e, "discarding undecodable cache entry");
                if let Err(_e) = self.inner.cache.remove(key) {
                    trace_event!(warn, error = %_e, "failed to remove undecodable cache entry");
                }
                None
            }
        }
    }

    fn cache_store(&self, entry: CacheEntry) {
        if let Err(_e) = self.inner.cache.store(entry) {
            trace_event!(warn, error = %_e, "cache store failed; response not cached");
        }
    }

    async fn round_trip(
        &self,
        url: &Url,
        request: &RequestDescriptor,
    ) -> Result<RawResponse, NumistaError> {
        let raw = self.inner.transport.send(url, request).await?;
        classify(raw, url)
    }
}

/// Maps a raw response onto success or the error taxonomy.
fn classify(raw: RawResponse, url: &Url) -> Result<RawResponse, NumistaError> {
    match raw.status {
        200..=299 => Ok(raw),
        429 => Err(NumistaError::QuotaRejected {
            url: url.to_string(),
            retry_after: retry_after(&raw.headers),
        }),
        500..=599 => Err(NumistaError::Server {
            status: raw.status,
            url: url.to_string(),
        }),
        status @ 400..=499 => Err(NumistaError::ClientRequest {
            status,
            url: url.to_string(),
            message: error_message(&raw.body),
        }),
        status => Err(NumistaError::UnexpectedStatus {
            status,
            url: url.to_string(),
        }),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

/// The API reports failures as `{"error_message": "..."}`.
fn error_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error_message: String,
    }
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .map(|b| b.error_message)
}

/* ----------------------- Builder ----------------------- */

/// Builder for [`NumistaClient`].
///
/// Starts from [`ClientConfig::default`]; [`NumistaClientBuilder::config`]
/// replaces all values at once and the other setters override single ones.
#[derive(Default)]
pub struct NumistaClientBuilder {
    config: ClientConfig,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    cache_ttl: Option<Duration>,
    rate_limit: Option<(u32, Duration)>,
    retry: Option<RetryConfig>,
    retry_enabled: Option<bool>,
    transport: Option<Arc<dyn Transport>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    in_memory_cache: bool,
    clock: Option<Arc<dyn Clock>>,
}

impl NumistaClientBuilder {
    /// Replace every configuration value.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the API key sent as `Numista-API-Key`.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set an OAuth access token sent as `Authorization: Bearer ...`.
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Override the API root (e.g., `https://api.numista.com/v3`).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Override the User-Agent.
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set a global request timeout (overall). Default: 30 seconds.
    #[must_use]
    pub const fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Set the TTL of cached responses. `Duration::ZERO` disables caching.
    #[must_use]
    pub const fn cache_ttl(mut self, dur: Duration) -> Self {
        self.cache_ttl = Some(dur);
        self
    }

    /// Keep the persistent cache in `dir` instead of the platform cache dir.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// Use a process-local cache instead of the SQLite file.
    #[must_use]
    pub const fn in_memory_cache(mut self) -> Self {
        self.in_memory_cache = true;
        self
    }

    /// Use a custom cache backend. Ignored when the TTL is zero.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Allow `requests` admissions per `window`. Zero requests disables limiting.
    #[must_use]
    pub const fn rate_limit(mut self, requests: u32, window: Duration) -> Self {
        self.rate_limit = Some((requests, window));
        self
    }

    /// Set the total number of attempts per call.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the growth factor of the exponential backoff.
    #[must_use]
    pub const fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    /// Replace the whole retry configuration.
    #[must_use]
    pub fn retry_config(mut self, cfg: RetryConfig) -> Self {
        self.retry = Some(cfg);
        self
    }

    /// Turn retries on or off without touching the rest of the retry configuration.
    #[must_use]
    pub const fn retry_enabled(mut self, enabled: bool) -> Self {
        self.retry_enabled = Some(enabled);
        self
    }

    /// Use a custom transport. Credentials are then the transport's concern
    /// and the API key is no longer required.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the clock used for cache timestamps and expiry.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// - [`NumistaError::Config`] if no API key was given for the default transport.
    /// - [`NumistaError::Url`] if the configured base URL does not parse.
    /// - [`NumistaError::Cache`] / [`NumistaError::Io`] if the cache cannot be opened.
    pub fn build(self) -> Result<NumistaClient, NumistaError> {
        let cfg = self.config;
        let base_url = Url::parse(&cfg.base_url)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let creds = Credentials::new(cfg.api_key.clone(), cfg.bearer_token.clone())?;
                Arc::new(HttpTransport::with_defaults(
                    creds.headers()?,
                    self.user_agent.as_deref().unwrap_or(USER_AGENT),
                    self.timeout.or_else(|| cfg.timeout()),
                )?)
            }
        };

        let cache_ttl = self.cache_ttl.unwrap_or_else(|| cfg.cache_ttl());
        let cache: Arc<dyn CacheStore> = if cache_ttl.is_zero() {
            Arc::new(NoopCache)
        } else if let Some(store) = self.cache_store {
            store
        } else if self.in_memory_cache {
            Arc::new(MemoryCache::with_clock(clock.clone()))
        } else {
            let dir = match cfg.cache_dir.clone() {
                Some(dir) => dir,
                None => SqliteCache::default_dir()?,
            };
            Arc::new(SqliteCache::open_in_dir(dir)?.with_clock(clock.clone()))
        };

        let (requests, window) = self
            .rate_limit
            .unwrap_or((cfg.rate_limit_requests, cfg.rate_limit_period()));

        let mut retry = self.retry.unwrap_or_else(|| cfg.retry_config());
        if let Some(enabled) = self.retry_enabled {
            retry.enabled = enabled;
        }

        Ok(NumistaClient {
            inner: Arc::new(Shared {
                transport,
                base_url,
                cache,
                cache_ttl,
                limiter: RateLimiter::new(requests, window),
                retry: RetryPolicy::new(retry),
                clock,
            }),
        })
    }
}
