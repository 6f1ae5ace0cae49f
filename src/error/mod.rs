//! Error types for bearer-relay.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for all bearer-relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No response reached the client.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The refresh exchange failed; the session has ended.
    #[error("Session refresh failed: {0}")]
    Refresh(#[source] AuthError),

    #[error("Authentication error: {0}")]
    Authentication(#[source] AuthError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl RelayError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Refresh(_) | Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Configuration(_) | Self::InvalidRequest(_) => ErrorCategory::Configuration,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
        }
    }

    /// Whether the error came from a failed refresh episode.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Self::Refresh(_))
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::Reauthenticate,
            ErrorCategory::Network | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration | ErrorCategory::Storage => {
                RecoverySuggestion::CheckConfiguration
            }
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

impl From<AuthError> for RelayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Storage(message) => Self::Storage(message),
            other => Self::Authentication(other),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RelayError>;
