use std::sync::Arc;

use reqwest::header::AUTHORIZATION;

use super::request::{RequestBody, RequestDescriptor};
use crate::auth::CredentialStore;
use crate::config::RelayConfig;
use crate::error::RelayError;

/// Sends requests with the current access credential attached.
///
/// The dispatcher only reads the credential store. Every HTTP status,
/// including 401, comes back as `Ok`; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    client: reqwest::Client,
    config: Arc<RelayConfig>,
    store: Arc<CredentialStore>,
}

impl RequestDispatcher {
    pub fn new(
        client: reqwest::Client,
        config: Arc<RelayConfig>,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client,
            config,
            store,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Send one request.
    ///
    /// The stored access credential, if any, replaces a caller-supplied
    /// `Authorization` header. With nothing stored the request goes out as
    /// the descriptor describes it.
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<reqwest::Response, RelayError> {
        self.send_with_credential(descriptor)
            .await
            .map(|(response, _)| response)
    }

    /// [`send`](Self::send), also returning the access credential that was
    /// attached, or `None` if the store was empty at send time.
    pub async fn send_with_credential(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<(reqwest::Response, Option<String>), RelayError> {
        let url = self.config.endpoint(&descriptor.path)?;
        let mut headers = descriptor.headers.clone();
        let credential = match self.store.get()? {
            Some(pair) => {
                headers.insert(AUTHORIZATION, pair.bearer_value()?);
                Some(pair.access().to_string())
            }
            None => None,
        };

        let mut builder = self
            .client
            .request(descriptor.method.clone(), url)
            .headers(headers);
        if !descriptor.query.is_empty() {
            builder = builder.query(&descriptor.query);
        }
        builder = match &descriptor.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Bytes { content_type, data }) => builder
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
            None => builder,
        };

        let response = builder.send().await?;
        tracing::debug!(
            method = %descriptor.method,
            path = %descriptor.path,
            status = response.status().as_u16(),
            retried = descriptor.retried,
            "request dispatched"
        );
        Ok((response, credential))
    }
}

/// Build the HTTP client used for all outbound calls.
pub fn build_client(config: &RelayConfig) -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| RelayError::Configuration(format!("failed to build HTTP client: {e}")))
}
