#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use httpmock::{Method::GET, Mock, MockServer};
use numista_rs::{
    Backoff, NumistaClient, NumistaClientBuilder, NumistaError, RawResponse, RequestDescriptor,
    RetryConfig, Transport,
};
use serde_json::{Value, json};
use url::Url;

pub const API_KEY: &str = "test-key";

pub fn setup_server() -> MockServer {
    MockServer::start()
}

/// Retries quickly so failure paths don't slow the suite down.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_attempts,
        backoff: Backoff::Fixed(Duration::from_millis(5)),
        respect_retry_after: false,
    }
}

/// A builder pointed at the mock server: in-memory cache, no rate limit, fast retries.
pub fn builder_for(server: &MockServer) -> NumistaClientBuilder {
    NumistaClient::builder()
        .api_key(API_KEY)
        .base_url(Url::parse(&server.base_url()).unwrap())
        .in_memory_cache()
        .rate_limit(0, Duration::ZERO)
        .retry_config(fast_retry(3))
}

pub fn client_for(server: &MockServer) -> NumistaClient {
    builder_for(server).build().unwrap()
}

pub fn mock_json<'a>(server: &'a MockServer, path: &str, status: u16, body: &Value) -> Mock<'a> {
    let body = body.to_string();
    server.mock(|when, then| {
        when.method(GET).path(path.to_string());
        then.status(status)
            .header("content-type", "application/json")
            .body(body);
    })
}

/// Mocks one page of `/types` holding items `first..first + len`.
pub fn mock_types_page<'a>(
    server: &'a MockServer,
    page: u32,
    count: u32,
    first: u32,
    len: u32,
) -> Mock<'a> {
    let items: Vec<Value> = (first..first + len)
        .map(|id| json!({"id": id, "title": format!("type {id}")}))
        .collect();
    let body = json!({"count": 0, "types": items}).to_string();
    server.mock(|when, then| {
        when.method(GET)
            .path("/types")
            .query_param("page", page.to_string())
            .query_param("count", count.to_string());
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    })
}

/// A transport that fails with a transport error a fixed number of times, then
/// answers every request with `response`.
pub struct FlakyTransport {
    failures: u32,
    response: RawResponse,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
}

impl FlakyTransport {
    pub fn new(failures: u32, response: RawResponse) -> Self {
        Self {
            failures,
            response,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_urls(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for FlakyTransport {
    fn send<'a>(
        &'a self,
        url: &'a Url,
        _request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, NumistaError>> + Send + 'a>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(url.to_string());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(NumistaError::Transport("connection reset by peer".into()))
            } else {
                Ok(self.response.clone())
            }
        })
    }
}
