//! Credential pair, storage scopes, and the credential store.

pub mod error;
pub mod scope;
pub mod storage;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use scope::StorageScope;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, ACCESS_KEY, REFRESH_KEY};
pub use store::CredentialStore;
pub use token::{CredentialPair, TokenPayload};
