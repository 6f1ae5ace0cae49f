//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::auth::storage::default_storage_dir;
use crate::error::RelayError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_REFRESH_PATH: &str = "auth/client/refresh/tokens";
pub const DEFAULT_LOGIN_PATH: &str = "auth/client/login";
pub const DEFAULT_LOGOUT_PATH: &str = "auth/client/logout";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_BASE_URL: &str = "BEARER_RELAY_BASE_URL";
const ENV_REFRESH_PATH: &str = "BEARER_RELAY_REFRESH_PATH";
const ENV_LOGIN_PATH: &str = "BEARER_RELAY_LOGIN_PATH";
const ENV_LOGOUT_PATH: &str = "BEARER_RELAY_LOGOUT_PATH";
const ENV_STORAGE_DIR: &str = "BEARER_RELAY_STORAGE_DIR";
const ENV_TIMEOUT_SECS: &str = "BEARER_RELAY_TIMEOUT_SECS";

/// Endpoints, storage location, and transport settings for a client.
///
/// # Example
/// ```
/// use bearer_relay::config::RelayConfig;
///
/// let config = RelayConfig::builder()
///     .base_url("https://api.example.com/api/v1")
///     .timeout_secs(10)
///     .build();
/// assert_eq!(
///     config.endpoint("auth/client/login").unwrap().as_str(),
///     "https://api.example.com/api/v1/auth/client/login"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(into, default = DEFAULT_REFRESH_PATH.to_string())]
    pub refresh_path: String,
    #[builder(into, default = DEFAULT_LOGIN_PATH.to_string())]
    pub login_path: String,
    #[builder(into, default = DEFAULT_LOGOUT_PATH.to_string())]
    pub logout_path: String,
    /// Directory of the durable credential file.
    #[builder(into, default = default_storage_dir())]
    pub storage_dir: PathBuf,
    #[builder(default = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RelayConfig {
    /// Defaults overridden by `BEARER_RELAY_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, RelayError> {
        let _ = dotenvy::dotenv();
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, RelayError> {
        toml::from_str(raw).map_err(|e| RelayError::Configuration(e.to_string()))
    }

    /// Load a TOML config file, then apply environment overrides.
    pub fn load_file(path: &Path) -> Result<Self, RelayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        Self::from_toml_str(&raw)?.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(path) = non_empty(ENV_REFRESH_PATH) {
            self.refresh_path = path;
        }
        if let Some(path) = non_empty(ENV_LOGIN_PATH) {
            self.login_path = path;
        }
        if let Some(path) = non_empty(ENV_LOGOUT_PATH) {
            self.logout_path = path;
        }
        if let Some(dir) = non_empty(ENV_STORAGE_DIR) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw.trim().parse().map_err(|_| {
                RelayError::Configuration(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                ))
            })?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve a path against the base URL. Absolute URLs pass through.
    pub fn endpoint(&self, path: &str) -> Result<Url, RelayError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        Url::parse(&raw).map_err(|e| RelayError::Configuration(format!("invalid URL {raw}: {e}")))
    }

    pub fn refresh_url(&self) -> Result<Url, RelayError> {
        self.endpoint(&self.refresh_path)
    }

    pub fn login_url(&self) -> Result<Url, RelayError> {
        self.endpoint(&self.login_path)
    }

    pub fn logout_url(&self) -> Result<Url, RelayError> {
        self.endpoint(&self.logout_path)
    }
}
