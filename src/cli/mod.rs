//! CLI entry point for bearer-relay.

pub mod auth;
pub mod request;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::auth::StorageScope;
use crate::config::RelayConfig;
use crate::error::RelayError;

/// bearer-relay CLI
#[derive(Parser, Debug)]
#[command(
    name = "bearer-relay",
    version,
    about = "Authenticated HTTP requests with automatic token refresh"
)]
pub struct Cli {
    /// TOML config file (defaults and BEARER_RELAY_* env vars otherwise)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the issued credentials
    Login(LoginArgs),
    /// Revoke and clear stored credentials
    Logout,
    /// Show stored credential status
    Status,
    /// Send an authenticated request
    Request(RequestArgs),
}

/// Arguments for `bearer-relay login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "BEARER_RELAY_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Where to keep credentials (durable or ephemeral)
    #[arg(long, default_value_t = StorageScope::Durable)]
    pub scope: StorageScope,
}

/// Arguments for `bearer-relay request`.
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, ...)
    pub method: String,

    /// Path relative to the base URL, or an absolute URL
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub json: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query")]
    pub query: Vec<String>,
}

impl Cli {
    /// Resolve the client configuration for this invocation.
    pub fn relay_config(&self) -> Result<RelayConfig, RelayError> {
        match &self.config {
            Some(path) => RelayConfig::load_file(path),
            None => RelayConfig::from_env(),
        }
    }
}
