use std::time::Duration;

use thiserror::Error;

/// The primary error type for all fallible operations in this crate.
///
/// The first seven variants are the pipeline taxonomy. `Transport`, `Server` and
/// `QuotaRejected` are retryable and only reach the caller wrapped in
/// [`NumistaError::RetriesExhausted`]; the others are fatal and returned as-is.
#[derive(Debug, Error)]
pub enum NumistaError {
    /// The request never produced an HTTP response (connect failure, timeout, reset).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a 5xx status.
    #[error("server error {status} at {url}")]
    Server {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
    },

    /// The server rejected the request because the quota is exhausted (HTTP 429).
    #[error("quota rejected (429) at {url}")]
    QuotaRejected {
        /// The URL that returned the error.
        url: String,
        /// The `Retry-After` hint, when the server sent one in seconds.
        retry_after: Option<Duration>,
    },

    /// The server rejected the request itself (4xx other than 429).
    #[error("request rejected with status {status} at {url}{}", detail(.message))]
    ClientRequest {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
        /// The API's `error_message`, when the body carried one.
        message: Option<String>,
    },

    /// The server answered with a status the pipeline does not expect (1xx, 3xx).
    #[error("unexpected status {status} at {url}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned it.
        url: String,
    },

    /// The response body was not valid JSON.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        last: Box<NumistaError>,
    },

    /// The payload decoded as JSON but did not have the expected shape.
    #[error("data format unexpected or missing field: {0}")]
    Data(String),

    /// The cache storage backend failed.
    #[error("cache storage error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// A filesystem operation failed (e.g. creating the cache directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A provided URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The client was configured inconsistently.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl NumistaError {
    /// Whether the retry policy may try the operation again after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Server { .. } | Self::QuotaRejected { .. }
        )
    }

    /// The HTTP status behind this error, looking through `RetriesExhausted`.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. }
            | Self::ClientRequest { status, .. }
            | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::QuotaRejected { .. } => Some(429),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    pub(crate) fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }
}

fn detail(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl From<reqwest::Error> for NumistaError {
    fn from(e: reqwest::Error) -> Self {
        Self::transport(e)
    }
}
