//! Blocking access to the request pipeline.
//!
//! [`BlockingClient`] drives the same async pipeline as [`NumistaClient`] on a
//! private runtime, so blocking and async callers share one cache and one rate
//! limiter. The runtime keeps a worker thread alive between calls: connections
//! it opens stay serviced while they sit in the shared pool, so a later async
//! call can reuse them. Do not use it from inside an async runtime; `block_on`
//! panics there.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;

use crate::core::client::{CacheMode, RetryConfig};
use crate::core::{NumistaClient, NumistaError, RequestDescriptor, ResponseEnvelope};
use crate::paginate::Paginator;

/// Synchronous handle over a [`NumistaClient`].
///
/// ```no_run
/// # use numista_rs::{NumistaClient, RequestDescriptor};
/// # fn main() -> Result<(), numista_rs::NumistaError> {
/// let client = NumistaClient::builder().api_key("my-key").build()?.blocking()?;
/// let env = client.execute(&RequestDescriptor::get("/issuers"))?;
/// println!("{}", env.payload());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BlockingClient {
    client: NumistaClient,
    rt: Arc<Runtime>,
}

impl BlockingClient {
    /// Wraps `client`, starting a runtime for it.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Io`] if the runtime cannot be built.
    pub fn new(client: NumistaClient) -> Result<Self, NumistaError> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("numista-blocking")
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            rt: Arc::new(rt),
        })
    }

    /// The async client this handle drives.
    #[must_use]
    pub const fn client(&self) -> &NumistaClient {
        &self.client
    }

    /// Blocking form of [`NumistaClient::execute`].
    ///
    /// # Errors
    ///
    /// Same as [`NumistaClient::execute_with`].
    pub fn execute(&self, request: &RequestDescriptor) -> Result<ResponseEnvelope, NumistaError> {
        self.rt.block_on(self.client.execute(request))
    }

    /// Blocking form of [`NumistaClient::execute_with`].
    ///
    /// # Errors
    ///
    /// Same as [`NumistaClient::execute_with`].
    pub fn execute_with(
        &self,
        request: &RequestDescriptor,
        cache_mode: CacheMode,
        retry_override: Option<&RetryConfig>,
    ) -> Result<ResponseEnvelope, NumistaError> {
        self.rt
            .block_on(self.client.execute_with(request, cache_mode, retry_override))
    }

    /// Blocking form of [`NumistaClient::get_json`].
    ///
    /// # Errors
    ///
    /// Same as [`NumistaClient::get_json`].
    pub fn get_json<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T, NumistaError> {
        self.rt.block_on(self.client.get_json(request))
    }

    /// Iterates the items of a paged listing with default paging options.
    pub fn paginate<T: DeserializeOwned>(
        &self,
        request: RequestDescriptor,
        items_key: impl Into<String>,
    ) -> BlockingPaginator<T> {
        self.iter(self.client.paginate(request, items_key))
    }

    /// Iterates an already configured [`Paginator`] on this handle's runtime.
    pub fn iter<T: DeserializeOwned>(&self, paginator: Paginator<T>) -> BlockingPaginator<T> {
        BlockingPaginator {
            inner: paginator,
            rt: Arc::clone(&self.rt),
        }
    }

    /// See [`NumistaClient::purge_cache`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    pub fn purge_cache(&self) -> Result<usize, NumistaError> {
        self.client.purge_cache()
    }

    /// See [`NumistaClient::clear_cache`].
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend fails.
    pub fn clear_cache(&self) -> Result<(), NumistaError> {
        self.client.clear_cache()
    }
}

/// [`Iterator`] over a [`Paginator`]; each `next` may block on a page fetch.
#[derive(Debug)]
pub struct BlockingPaginator<T> {
    inner: Paginator<T>,
    rt: Arc<Runtime>,
}

impl<T: DeserializeOwned> BlockingPaginator<T> {
    /// How many pages have been requested so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.inner.pages_fetched()
    }
}

impl<T: DeserializeOwned> Iterator for BlockingPaginator<T> {
    type Item = Result<T, NumistaError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rt.block_on(self.inner.next_item())
    }
}
