//! The authenticated client: one `execute` entry point plus session primitives.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;

use crate::auth::{
    AuthError, CredentialPair, CredentialStore, FileStorage, KeyValueStorage, MemoryStorage,
    StorageScope, TokenPayload,
};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::http::{build_client, RequestDescriptor, RequestDispatcher};
use crate::refresh::{
    HttpRefreshExchange, RefreshCoordinator, RefreshExchange, SessionEvent, SessionEvents,
};
use crate::util::retry::RetryPolicy;

/// HTTP client that attaches bearer credentials and recovers from expiry.
///
/// Callers never see refresh exchanges or replays: [`AuthenticatedClient::execute`]
/// yields one final response or one terminal error per request.
///
/// # Example
/// ```no_run
/// use bearer_relay::config::RelayConfig;
/// use bearer_relay::http::RequestDescriptor;
/// use bearer_relay::session::AuthenticatedClient;
///
/// # async fn example() -> bearer_relay::error::Result<()> {
/// let client = AuthenticatedClient::new(RelayConfig::from_env()?)?;
/// client.on_session_event(|event| eprintln!("session changed: {event:?}"));
/// let response = client.execute(RequestDescriptor::get("profile/profile")).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    config: Arc<RelayConfig>,
    store: Arc<CredentialStore>,
    events: Arc<SessionEvents>,
    policy: RetryPolicy,
}

impl AuthenticatedClient {
    /// Client with file-backed durable storage under `config.storage_dir`.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        ClientBuilder::new(config).build()
    }

    pub fn from_env() -> Result<Self, RelayError> {
        Self::new(RelayConfig::from_env()?)
    }

    pub fn builder(config: RelayConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Send a request with the current credential, refreshing and replaying
    /// once if the credential was rejected.
    pub async fn execute(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<reqwest::Response, RelayError> {
        self.policy.execute(descriptor).await
    }

    /// [`execute`](Self::execute), then decode a JSON body. Non-2xx statuses
    /// become [`RelayError::Api`].
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, RelayError> {
        let response = self.execute(descriptor).await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RelayError::api(status.as_u16(), body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Log in with email and password, storing the issued pair in `scope`.
    ///
    /// The login call itself is unauthenticated and never replayed. The new
    /// pair replaces any previous session in both scopes; if it cannot be
    /// written the previous session is kept.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        scope: StorageScope,
    ) -> Result<CredentialPair, RelayError> {
        let response = self
            .policy
            .dispatcher()
            .client()
            .post(self.config.login_url()?)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::api(status.as_u16(), body));
        }
        let body: serde_json::Value = response.json().await?;
        let payload = TokenPayload::from_json(&body)?;
        let pair = payload
            .refresh
            .and_then(|refresh| CredentialPair::new(payload.access, refresh))
            .ok_or_else(|| {
                AuthError::InvalidResponse("login response is missing a token".to_string())
            })?;

        self.store.replace(scope, &pair)?;
        tracing::info!(%scope, "logged in");
        Ok(pair)
    }

    /// End the session.
    ///
    /// The refresh credential is revoked on the server if possible; failures
    /// of that call are ignored. Stored credentials are always cleared.
    pub async fn logout(&self) -> Result<(), RelayError> {
        if let Some(pair) = self.store.get()? {
            let request = RequestDescriptor::post(self.config.logout_path.clone())
                .with_json(json!({ "refresh": pair.refresh() }));
            match self.policy.dispatcher().send(&request).await {
                Ok(response) if !response.status().is_success() => {
                    tracing::debug!(status = response.status().as_u16(), "logout call rejected");
                }
                Ok(_) => {}
                Err(err) => tracing::debug!(error = %err, "logout call failed"),
            }
        }
        self.store.clear()?;
        self.events.emit(SessionEvent::LoggedOut { at: Utc::now() });
        tracing::info!("logged out");
        Ok(())
    }

    /// Stored credentials, if a full pair is present.
    pub fn credentials(&self) -> Result<Option<CredentialPair>, RelayError> {
        Ok(self.store.get()?)
    }

    /// Store a pair obtained by an external login flow in the active scope.
    pub fn store_credentials(&self, pair: &CredentialPair) -> Result<(), RelayError> {
        Ok(self.store.set(pair)?)
    }

    pub fn scope(&self) -> StorageScope {
        self.store.scope()
    }

    pub fn set_scope(&self, scope: StorageScope) {
        self.store.set_scope(scope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn on_session_event<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.events.on_event(handler);
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        self.policy.coordinator()
    }
}

/// Assembles an [`AuthenticatedClient`], with optional replacement parts.
pub struct ClientBuilder {
    config: RelayConfig,
    durable: Option<Arc<dyn KeyValueStorage>>,
    ephemeral: Option<Arc<dyn KeyValueStorage>>,
    exchange: Option<Arc<dyn RefreshExchange>>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            durable: None,
            ephemeral: None,
            exchange: None,
            http_client: None,
        }
    }

    pub fn with_durable_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.durable = Some(storage);
        self
    }

    pub fn with_ephemeral_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.ephemeral = Some(storage);
        self
    }

    pub fn with_exchange(mut self, exchange: Arc<dyn RefreshExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client. Scope detection runs here, once.
    pub fn build(self) -> Result<AuthenticatedClient, RelayError> {
        let config = Arc::new(self.config);
        let durable = self
            .durable
            .unwrap_or_else(|| Arc::new(FileStorage::new(config.storage_dir.clone())));
        let ephemeral = self
            .ephemeral
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let store = Arc::new(CredentialStore::new(durable, ephemeral)?);

        let client = match self.http_client {
            Some(client) => client,
            None => build_client(&config)?,
        };
        let exchange: Arc<dyn RefreshExchange> = match self.exchange {
            Some(exchange) => exchange,
            None => Arc::new(HttpRefreshExchange::new(
                client.clone(),
                config.refresh_url()?,
            )),
        };

        let events = Arc::new(SessionEvents::new());
        let coordinator = RefreshCoordinator::new(store.clone(), exchange, events.clone());
        let dispatcher = RequestDispatcher::new(client, config.clone(), store.clone());

        Ok(AuthenticatedClient {
            config,
            store,
            events,
            policy: RetryPolicy::new(dispatcher, coordinator),
        })
    }
}
