use async_trait::async_trait;
use reqwest::Url;
use serde_json::json;

use crate::auth::{AuthError, TokenPayload};

/// Trades a refresh credential for a new access credential.
#[async_trait]
pub trait RefreshExchange: Send + Sync {
    async fn exchange(&self, refresh: &str) -> Result<TokenPayload, AuthError>;
}

/// `POST {"refresh": ...}` to the refresh endpoint.
///
/// Uses its own plain client call: the exchange never carries a bearer header
/// and is never routed through the retry path.
#[derive(Debug, Clone)]
pub struct HttpRefreshExchange {
    client: reqwest::Client,
    url: Url,
}

impl HttpRefreshExchange {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RefreshExchange for HttpRefreshExchange {
    async fn exchange(&self, refresh: &str) -> Result<TokenPayload, AuthError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("Accept", "application/json")
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        TokenPayload::from_json(&body)
    }
}
