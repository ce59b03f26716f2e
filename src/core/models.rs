use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::NumistaError;
use crate::core::client::constants::{CACHE_HIT_ICON, CACHE_MISS_ICON};

/// The uniform result of a pipeline call.
///
/// Built fresh for every call and owned by the caller that received it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    payload: Value,
    from_cache: bool,
    status: u16,
}

impl ResponseEnvelope {
    pub(crate) const fn new(payload: Value, from_cache: bool, status: u16) -> Self {
        Self {
            payload,
            from_cache,
            status,
        }
    }

    /// The decoded JSON payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// `true` when the response came from the cache store without a network call.
    #[must_use]
    pub const fn served_from_cache(&self) -> bool {
        self.from_cache
    }

    /// The HTTP status of the (possibly cached) response.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// A one-character marker for terminal output: 💾 for cache hits, 🌐 otherwise.
    #[must_use]
    pub const fn cache_indicator(&self) -> &'static str {
        if self.from_cache {
            CACHE_HIT_ICON
        } else {
            CACHE_MISS_ICON
        }
    }

    /// Deserializes the payload into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Data`] if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, NumistaError> {
        T::deserialize(&self.payload).map_err(|e| NumistaError::Data(e.to_string()))
    }

    /// Deserializes the value under `key` into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`NumistaError::Data`] if `key` is missing or does not match `T`.
    pub fn decode_field<T: DeserializeOwned>(&self, key: &str) -> Result<T, NumistaError> {
        let field = self
            .payload
            .get(key)
            .ok_or_else(|| NumistaError::Data(format!("missing field `{key}`")))?;
        T::deserialize(field).map_err(|e| NumistaError::Data(format!("field `{key}`: {e}")))
    }
}

/// Decodes a response body into JSON. A `204` with an empty body is `null`.
pub(crate) fn decode_body(status: u16, body: &[u8]) -> Result<Value, NumistaError> {
    if status == 204 && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}
