//! numista-rs: a resilient client for the Numista catalogue API.
//!
//! Every call goes through one request pipeline:
//! persistent response cache, then rate limiter admission, then the network
//! call wrapped in retry with exponential backoff. The same pipeline is
//! reachable from async code ([`NumistaClient`]) and from blocking code
//! ([`blocking::BlockingClient`]). [`Paginator`] walks paged listings lazily
//! on top of it.
//!
//! ```no_run
//! # use numista_rs::{NumistaClient, RequestDescriptor};
//! # #[tokio::main]
//! # async fn main() -> Result<(), numista_rs::NumistaError> {
//! let client = NumistaClient::builder().api_key("my-key").build()?;
//! let env = client.execute(&RequestDescriptor::get("/catalogues")).await?;
//! println!("{} {}", env.cache_indicator(), env.payload());
//! # Ok(())
//! # }
//! ```

// Emits a `tracing` event when the `tracing` feature is on, nothing otherwise.
macro_rules! trace_event {
    ($level:ident, $($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        {
            tracing::$level!($($arg)+);
        }
    };
}

pub mod blocking;
pub mod core;
pub mod paginate;

pub use crate::core::cache::{CacheEntry, CacheStore, MemoryCache, NoopCache, SqliteCache};
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::client::{
    Backoff, CacheMode, NumistaClient, NumistaClientBuilder, RetryConfig, RetryPolicy,
};
pub use crate::core::config::ClientConfig;
pub use crate::core::error::NumistaError;
pub use crate::core::limiter::RateLimiter;
pub use crate::core::models::ResponseEnvelope;
pub use crate::core::request::{CacheKey, Method, RequestDescriptor};
pub use crate::core::transport::{HttpTransport, RawResponse, Transport};
pub use blocking::{BlockingClient, BlockingPaginator};
pub use paginate::{PageCursor, Paginator};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG` (default `numista_rs=debug`).
///
/// Meant for demos and tests; applications should configure their own subscriber.
/// Calling it twice is harmless.
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("numista_rs=debug"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
