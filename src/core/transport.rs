use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use url::Url;

use crate::core::{NumistaError, RequestDescriptor};

/// A single HTTP round trip as seen by the pipeline.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// A response with no headers, mostly for tests and custom transports.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Performs one HTTP round trip.
///
/// Implementations return `Ok` for every HTTP status; the pipeline classifies
/// statuses itself. `Err` is reserved for failures where no response arrived
/// and should be [`NumistaError::Transport`] so it is retried.
pub trait Transport: Send + Sync {
    /// Sends `request` to the fully resolved `url`.
    fn send<'a>(
        &'a self,
        url: &'a Url,
        request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, NumistaError>> + Send + 'a>>;
}

/// The default transport, backed by a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Wraps a preconfigured client (proxy, custom TLS, ...).
    ///
    /// Credentials are not added by the pipeline; the client must already carry
    /// the `Numista-API-Key` default header.
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub(crate) fn with_defaults(
        headers: HeaderMap,
        user_agent: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, NumistaError> {
        let mut httpb = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers);
        if let Some(t) = timeout {
            httpb = httpb.timeout(t);
        }
        let http = httpb
            .build()
            .map_err(|e| NumistaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        url: &'a Url,
        request: &'a RequestDescriptor,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, NumistaError>> + Send + 'a>> {
        Box::pin(async move {
            let mut req = self
                .http
                .request(request.method().into(), url.clone())
                .header(ACCEPT, "application/json");
            if let Some(body) = request.body_bytes() {
                req = req.body(body.to_vec());
                if let Some(ct) = request.content_type() {
                    req = req.header(CONTENT_TYPE, ct);
                }
            }

            let resp = req.send().await?;
            let status = resp.status().as_u16();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?.to_vec();
            Ok(RawResponse {
                status,
                headers,
                body,
            })
        })
    }
}
