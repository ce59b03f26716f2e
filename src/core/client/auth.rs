//! API key & OAuth bearer headers for Numista endpoints.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use super::constants::API_KEY_HEADER;
use crate::core::NumistaError;

/// Credentials attached to every request.
///
/// The API key is mandatory for every endpoint. The bearer token is only
/// needed for user-scoped endpoints (collections, user profile).
#[derive(Clone)]
pub(crate) struct Credentials {
    api_key: String,
    bearer_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub(crate) fn new(
        api_key: Option<String>,
        bearer_token: Option<String>,
    ) -> Result<Self, NumistaError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NumistaError::Config("a Numista API key is required".into()))?;
        Ok(Self {
            api_key,
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Default headers for the HTTP transport. Values are marked sensitive.
    pub(crate) fn headers(&self) -> Result<HeaderMap, NumistaError> {
        let mut headers = HeaderMap::new();

        let mut key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| NumistaError::Config("API key contains invalid header characters".into()))?;
        key.set_sensitive(true);
        let name = HeaderName::from_bytes(API_KEY_HEADER.as_bytes())
            .map_err(|_| NumistaError::Config("invalid API key header name".into()))?;
        headers.insert(name, key);

        if let Some(token) = &self.bearer_token {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                NumistaError::Config("bearer token contains invalid header characters".into())
            })?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        Ok(headers)
    }
}
