use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::core::NumistaError;

/// HTTP method of a [`RequestDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`; the only cache-eligible method.
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// The canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Side-effect-free methods may be served from the cache.
    #[must_use]
    pub const fn is_cache_eligible(self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

/// One logical API request: method, path, query, and optional body.
///
/// Built with consuming setters and immutable afterwards. Query keys are
/// unique: setting a key that is already present replaces its value in place,
/// so insertion order is kept for the wire while [`CacheKey`] ignores it.
///
/// ```
/// # use numista_rs::RequestDescriptor;
/// let a = RequestDescriptor::get("/types").query("q", "euro").query("page", 2);
/// let b = RequestDescriptor::get("types").query("page", 2).query("q", "euro");
/// assert_eq!(a.cache_key(), b.cache_key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    content_type: Option<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `method` on `path`.
    ///
    /// `path` is relative to the client's base URL unless it is an absolute
    /// `http(s)://` URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            content_type: None,
        }
    }

    /// Shorthand for `RequestDescriptor::new(Method::Get, path)`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Shorthand for `RequestDescriptor::new(Method::Post, path)`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Shorthand for `RequestDescriptor::new(Method::Put, path)`.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    /// Shorthand for `RequestDescriptor::new(Method::Patch, path)`.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    /// Shorthand for `RequestDescriptor::new(Method::Delete, path)`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Sets a query parameter, replacing the value if `key` is already present.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.query.push((key, value)),
        }
        self
    }

    /// Sets a query parameter only when `value` is `Some`.
    #[must_use]
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Attaches a raw body with its content type.
    #[must_use]
    pub fn body(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Some(bytes.into());
        self.content_type = Some(content_type.into());
        self
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Decode`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, NumistaError> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self.body(bytes, "application/json"))
    }

    /// The HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The path as given.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// The value of query parameter `key`, if set.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The request body, if any.
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// The content type of the body, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether responses to this request may be cached.
    #[must_use]
    pub const fn is_cache_eligible(&self) -> bool {
        self.method.is_cache_eligible()
    }

    /// Whether `path` is already an absolute URL.
    pub(crate) fn is_absolute(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }

    /// Stable digest of method, normalized path and sorted query.
    ///
    /// The key does not include a host. Stores shared by clients talking to
    /// different base URLs should use [`RequestDescriptor::cache_key_at`].
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        let path = if self.is_absolute() {
            self.path.clone()
        } else {
            format!("/{}", self.path.trim_start_matches('/'))
        };
        self.digest(&path)
    }

    /// Digest of method, the resolved `endpoint` (scheme, host, port and path)
    /// and sorted query. The query already present on `endpoint` is ignored.
    #[must_use]
    pub fn cache_key_at(&self, endpoint: &Url) -> CacheKey {
        let mut target = endpoint.clone();
        target.set_query(None);
        target.set_fragment(None);
        self.digest(target.as_str())
    }

    fn digest(&self, target: &str) -> CacheKey {
        let mut pairs: Vec<&(String, String)> = self.query.iter().collect();
        pairs.sort();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(target.as_bytes());
        hasher.update(b"\n");
        hasher.update(query.as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }
}

/// Hex-encoded SHA-256 digest identifying a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already computed digest (e.g. read back from storage).
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
