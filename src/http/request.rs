use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;

use crate::auth::token::bearer_header;
use crate::auth::AuthError;
use crate::error::RelayError;

/// Request body carried by a [`RequestDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes {
        content_type: String,
        data: Vec<u8>,
    },
}

/// A replayable outbound call.
///
/// `retried` records whether the request has already been replayed once
/// after a refresh; it is never replayed a second time.
///
/// # Example
/// ```
/// use bearer_relay::http::RequestDescriptor;
/// use serde_json::json;
///
/// let request = RequestDescriptor::post("profile/onboarding")
///     .with_json(json!({"currency": "EUR"}))
///     .with_query("period", "month");
/// assert!(!request.retried);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the configured base URL, or an absolute URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_bytes(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Bytes {
            content_type: content_type.into(),
            data,
        });
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header. Invalid names or values are rejected.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, RelayError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RelayError::InvalidRequest(format!("invalid header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RelayError::InvalidRequest(format!("invalid value for header {name}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Set the `Authorization: Bearer` header, replacing any existing value.
    pub fn bearer(&mut self, access: &str) -> Result<(), AuthError> {
        self.headers.insert(AUTHORIZATION, bearer_header(access)?);
        Ok(())
    }

    /// Current `Authorization` header, if set.
    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(AUTHORIZATION)
    }
}
