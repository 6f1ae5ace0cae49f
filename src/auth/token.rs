use reqwest::header::HeaderValue;
use serde::Deserialize;

use super::error::AuthError;

/// An access/refresh credential pair.
///
/// Both fields are always non-empty. "No session" is represented by the
/// absence of a pair, never by a pair with an empty field.
///
/// # Example
/// ```
/// use bearer_relay::auth::CredentialPair;
///
/// let pair = CredentialPair::new("access", "refresh").expect("both fields set");
/// assert_eq!(pair.access(), "access");
/// assert!(CredentialPair::new("access", "").is_none());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    access: String,
    refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Option<Self> {
        let access = access.into();
        let refresh = refresh.into();
        if access.is_empty() || refresh.is_empty() {
            return None;
        }
        Some(Self { access, refresh })
    }

    pub fn access(&self) -> &str {
        &self.access
    }

    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// `Authorization` header value for the access credential.
    ///
    /// The returned value is marked sensitive so it is redacted in debug output.
    pub fn bearer_value(&self) -> Result<HeaderValue, AuthError> {
        bearer_header(&self.access)
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Build a sensitive `Bearer <token>` header value.
pub fn bearer_header(access: &str) -> Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {access}")).map_err(|_| {
        AuthError::InvalidResponse("access token is not a valid header value".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Token fields extracted from a login or refresh response.
///
/// Servers wrap the tokens differently depending on the endpoint: at the top
/// level, under `data`, or under `data.tokens`. All three are accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub access: String,
    pub refresh: Option<String>,
}

impl TokenPayload {
    /// Extract tokens from a response body. The access token is required.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, AuthError> {
        let candidates = [
            body.get("data").and_then(|d| d.get("tokens")),
            body.get("data"),
            Some(body),
        ];
        for candidate in candidates.into_iter().flatten() {
            let Ok(raw) = RawTokens::deserialize(candidate) else {
                continue;
            };
            if let Some(access) = raw.access.filter(|a| !a.is_empty()) {
                return Ok(Self {
                    access,
                    refresh: raw.refresh.filter(|r| !r.is_empty()),
                });
            }
        }
        Err(AuthError::InvalidResponse(
            "response does not carry an access token".to_string(),
        ))
    }

    /// Merge with the refresh token in use, keeping it when the server did not rotate.
    pub fn into_pair(self, current_refresh: &str) -> Option<CredentialPair> {
        let refresh = self.refresh.unwrap_or_else(|| current_refresh.to_string());
        CredentialPair::new(self.access, refresh)
    }
}

impl std::fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPayload")
            .field("access", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize)]
struct RawTokens {
    access: Option<String>,
    refresh: Option<String>,
}
