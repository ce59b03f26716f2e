//! Lazy page-by-page iteration over listing endpoints.
//!
//! A [`Paginator`] issues one pipeline call per page, only when the consumer
//! asks for an item past the ones already buffered. Dropping it stops all
//! further fetches.

use std::collections::VecDeque;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{NumistaClient, NumistaError, RequestDescriptor};

const DEFAULT_PAGE_PARAM: &str = "page";
const DEFAULT_PAGE_SIZE_PARAM: &str = "count";

/// The position of a paginator: the next page to fetch and the page-size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    /// Page number sent with the next fetch.
    pub page: u32,
    /// Items requested per page, if the paginator sends a page size.
    pub page_size: Option<u32>,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: None,
        }
    }
}

/// A lazy, finite sequence of the items of a paged listing.
///
/// Each page is fetched through [`NumistaClient::execute`] with the page
/// parameter set on the base request, so pages are cached and rate limited
/// like any other call. The sequence ends after the first page that
///
/// - holds no items,
/// - holds fewer items than the configured page size, or
/// - lacks the configured next-page marker.
///
/// Errors are yielded once, after which the sequence is exhausted.
///
/// ```no_run
/// # use numista_rs::{NumistaClient, RequestDescriptor};
/// # async fn run(client: NumistaClient) -> Result<(), numista_rs::NumistaError> {
/// let mut types = client
///     .paginate::<serde_json::Value>(RequestDescriptor::get("/types").query("q", "franc"), "types")
///     .page_size(50);
/// while let Some(item) = types.next_item().await {
///     println!("{}", item?["title"]);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Paginator<T = Value> {
    client: NumistaClient,
    request: RequestDescriptor,
    items_key: String,
    page_param: String,
    page_size_param: String,
    next_marker: Option<String>,
    cursor: PageCursor,
    buffer: VecDeque<Result<T, NumistaError>>,
    done: bool,
    pages_fetched: u32,
}

impl<T: DeserializeOwned> Paginator<T> {
    /// Walks `request` page by page, reading items from the array under `items_key`.
    pub fn new(client: NumistaClient, request: RequestDescriptor, items_key: impl Into<String>) -> Self {
        Self {
            client,
            request,
            items_key: items_key.into(),
            page_param: DEFAULT_PAGE_PARAM.to_string(),
            page_size_param: DEFAULT_PAGE_SIZE_PARAM.to_string(),
            next_marker: None,
            cursor: PageCursor::default(),
            buffer: VecDeque::new(),
            done: false,
            pages_fetched: 0,
        }
    }

    /// Query parameter carrying the page number. Default: `page`.
    #[must_use]
    pub fn page_param(mut self, name: impl Into<String>) -> Self {
        self.page_param = name.into();
        self
    }

    /// Request `size` items per page; a page with fewer items is the last one.
    #[must_use]
    pub const fn page_size(mut self, size: u32) -> Self {
        self.cursor.page_size = Some(size);
        self
    }

    /// Query parameter carrying the page size. Default: `count`.
    #[must_use]
    pub fn page_size_param(mut self, name: impl Into<String>) -> Self {
        self.page_size_param = name.into();
        self
    }

    /// Number of the first page. Default: 1.
    #[must_use]
    pub const fn first_page(mut self, page: u32) -> Self {
        self.cursor.page = page;
        self
    }

    /// Stop after a page whose `key` is missing or `null` (e.g. `next_url`).
    #[must_use]
    pub fn next_marker(mut self, key: impl Into<String>) -> Self {
        self.next_marker = Some(key.into());
        self
    }

    /// The current cursor.
    #[must_use]
    pub const fn cursor(&self) -> PageCursor {
        self.cursor
    }

    /// How many pages have been requested from the pipeline so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Pulls the next item, fetching the next page if the buffer is empty.
    ///
    /// Returns `None` once the listing is exhausted or after an error was yielded.
    pub async fn next_item(&mut self) -> Option<Result<T, NumistaError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page().await {
                self.done = true;
                return Some(Err(e));
            }
        }
    }

    /// Adapts the paginator into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<T, NumistaError>> {
        futures::stream::unfold(self, |mut pages| async move {
            pages.next_item().await.map(|item| (item, pages))
        })
    }

    /// Drains the remaining items into a vector, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error the sequence yields.
    pub async fn collect_all(mut self) -> Result<Vec<T>, NumistaError> {
        let mut out = Vec::new();
        while let Some(item) = self.next_item().await {
            out.push(item?);
        }
        Ok(out)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self), fields(page = self.cursor.page), err)
    )]
    async fn fetch_page(&mut self) -> Result<(), NumistaError> {
        let mut request = self
            .request
            .clone()
            .query(self.page_param.as_str(), self.cursor.page);
        if let Some(size) = self.cursor.page_size {
            request = request.query(self.page_size_param.as_str(), size);
        }

        let envelope = self.client.execute(&request).await?;
        self.pages_fetched += 1;
        self.cursor.page = self.cursor.page.saturating_add(1);

        let payload = envelope.payload();
        let items = payload
            .get(&self.items_key)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                NumistaError::Data(format!("page has no `{}` array", self.items_key))
            })?;

        for item in items {
            match T::deserialize(item) {
                Ok(value) => self.buffer.push_back(Ok(value)),
                Err(e) => {
                    self.buffer
                        .push_back(Err(NumistaError::Data(format!("{}: {e}", self.items_key))));
                    self.done = true;
                    return Ok(());
                }
            }
        }

        let count = items.len();
        let short_page = self
            .cursor
            .page_size
            .is_some_and(|size| count < usize::try_from(size).unwrap_or(usize::MAX));
        let no_next = self
            .next_marker
            .as_deref()
            .is_some_and(|key| payload.get(key).is_none_or(Value::is_null));
        trace_event!(
            debug,
            items = count,
            cached = envelope.served_from_cache(),
            "page fetched"
        );

        if count == 0 || short_page || no_next {
            self.done = true;
        }
        Ok(())
    }
}
