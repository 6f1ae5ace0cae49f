#![allow(dead_code)]

use std::sync::Arc;

use bearer_relay::auth::{KeyValueStorage, MemoryStorage, ACCESS_KEY, REFRESH_KEY};
use bearer_relay::config::RelayConfig;
use bearer_relay::session::AuthenticatedClient;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REFRESH_PATH: &str = "/auth/client/refresh/tokens";

/// A client wired to `server` with in-memory storages the test can inspect.
pub struct Harness {
    pub client: AuthenticatedClient,
    pub durable: Arc<MemoryStorage>,
    pub ephemeral: Arc<MemoryStorage>,
}

pub fn config_for(server: &MockServer) -> RelayConfig {
    RelayConfig::builder().base_url(server.uri()).build()
}

/// Build a client after seeding storages, so scope detection sees the seed.
pub fn harness(
    server: &MockServer,
    durable_seed: Option<(&str, &str)>,
    ephemeral_seed: Option<(&str, &str)>,
) -> Harness {
    let durable = Arc::new(MemoryStorage::new());
    let ephemeral = Arc::new(MemoryStorage::new());
    if let Some((access, refresh)) = durable_seed {
        seed(durable.as_ref(), access, refresh);
    }
    if let Some((access, refresh)) = ephemeral_seed {
        seed(ephemeral.as_ref(), access, refresh);
    }
    let client = AuthenticatedClient::builder(config_for(server))
        .with_durable_storage(durable.clone())
        .with_ephemeral_storage(ephemeral.clone())
        .build()
        .expect("client should build");
    Harness {
        client,
        durable,
        ephemeral,
    }
}

pub fn seed(storage: &dyn KeyValueStorage, access: &str, refresh: &str) {
    storage.set_item(ACCESS_KEY, access).expect("seed access");
    storage.set_item(REFRESH_KEY, refresh).expect("seed refresh");
}

pub fn stored(storage: &dyn KeyValueStorage) -> (Option<String>, Option<String>) {
    (
        storage.get_item(ACCESS_KEY).expect("read access"),
        storage.get_item(REFRESH_KEY).expect("read refresh"),
    )
}

/// `path` answers 200 for `Bearer {valid}` and 401 for anything else.
pub async fn mount_protected(server: &MockServer, route: &str, valid: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", format!("Bearer {valid}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })))
        .mount(server)
        .await;
}

/// Requests `server` received with the given bearer header on `route`.
pub async fn hits_with_bearer(server: &MockServer, route: &str, token: &str) -> usize {
    let expected = format!("Bearer {token}");
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .filter(|req| req.url.path() == route)
        .filter(|req| {
            req.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some(expected.as_str())
        })
        .count()
}

pub async fn refresh_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording enabled")
        .iter()
        .filter(|req| req.url.path() == REFRESH_PATH)
        .count()
}
