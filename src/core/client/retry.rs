use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_MAX_MS,
    DEFAULT_RETRY_ATTEMPTS,
};
use crate::core::NumistaError;

/// Specifies the backoff strategy for retrying failed requests.
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed(Duration),
    /// Uses an exponential delay between retries.
    /// The delay is calculated as `base * (factor ^ attempt)`, capped at `max`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries, before jitter.
        max: Duration,
        /// Whether to add random jitter of up to +50% to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            factor: DEFAULT_BACKOFF_FACTOR,
            max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            jitter: true,
        }
    }
}

/// Configuration for the automatic retry mechanism.
///
/// Which failures are retried is fixed: transport errors, 5xx and 429.
/// Every other failure is returned on the first attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism. Disabled means a single attempt.
    pub enabled: bool,
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// Wait at least as long as a 429 `Retry-After` hint (capped at the backoff maximum).
    pub respect_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Backoff::default(),
            respect_retry_after: false,
        }
    }
}

impl RetryConfig {
    /// A configuration that makes exactly one attempt.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Effective attempt budget.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// The delay before retry number `attempt + 1` (zero-based `attempt`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
                let grown = base.as_secs_f64() * factor.powi(exp);
                let mut secs = grown.min(max.as_secs_f64()).max(0.0);
                if *jitter {
                    secs += rand::thread_rng().r#gen::<f64>() * secs / 2.0;
                }
                Duration::try_from_secs_f64(secs).unwrap_or(*max)
            }
        }
    }

    fn delay_after(&self, attempt: u32, err: &NumistaError) -> Duration {
        let computed = self.delay_for(attempt);
        match err {
            NumistaError::QuotaRejected {
                retry_after: Some(hint),
                ..
            } if self.respect_retry_after => {
                let cap = match &self.backoff {
                    Backoff::Exponential { max, .. } => *max,
                    Backoff::Fixed(_) => Duration::MAX,
                };
                computed.max((*hint).min(cap))
            }
            _ => computed,
        }
    }
}

/// Runs a fallible operation under a [`RetryConfig`].
///
/// The attempt state lives only inside [`RetryPolicy::run`]. Dropping the
/// returned future cancels the call: no further attempts are scheduled.
#[derive(Clone, Debug, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from `config`.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calls `op` with the zero-based attempt number until it succeeds, fails
    /// fatally, or the attempt budget runs out.
    ///
    /// # Errors
    ///
    /// Fatal errors are returned unchanged. When the budget is exhausted the
    /// last retryable error is wrapped in [`NumistaError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, NumistaError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, NumistaError>>,
    {
        let budget = self.config.attempts();
        let mut attempt = 0;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= budget {
                trace_event!(warn, attempts = attempt, error = %err, "retries exhausted");
                return Err(NumistaError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.config.delay_after(attempt - 1, &err);
            trace_event!(debug, attempt, ?delay, error = %err, "retrying after transient failure");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Defines the behavior of the response cache for an API call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present; otherwise, fetch from the network
    /// and write the response to the cache. (Default)
    #[default]
    Use,
    /// Always fetch from the network, bypassing any cached entry, and write the new response to the cache.
    Refresh,
    /// Always fetch from the network and do not read from or write to the cache.
    Bypass,
}
