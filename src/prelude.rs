//! Convenience re-exports for common use.

pub use crate::auth::{AuthError, CredentialPair, StorageScope};
pub use crate::config::RelayConfig;
pub use crate::error::{RelayError, Result};
pub use crate::http::RequestDescriptor;
pub use crate::refresh::SessionEvent;
pub use crate::session::AuthenticatedClient;
