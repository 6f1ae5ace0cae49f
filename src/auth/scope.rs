use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::AuthError;
use super::storage::{KeyValueStorage, ACCESS_KEY, REFRESH_KEY};

/// Persistence lifetime of stored credentials.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageScope {
    /// Survives restarts.
    #[default]
    #[strum(to_string = "durable", serialize = "local")]
    Durable,
    /// Lives as long as the current process.
    #[strum(to_string = "ephemeral", serialize = "session")]
    Ephemeral,
}

impl StorageScope {
    /// The scope that is not `self`.
    pub fn other(self) -> Self {
        match self {
            Self::Durable => Self::Ephemeral,
            Self::Ephemeral => Self::Durable,
        }
    }

    /// Infer the active scope from what each storage already holds.
    ///
    /// Ephemeral storage wins if it holds either credential, then durable;
    /// with nothing stored the scope defaults to durable.
    pub fn detect(
        durable: &dyn KeyValueStorage,
        ephemeral: &dyn KeyValueStorage,
    ) -> Result<Self, AuthError> {
        if holds_any_credential(ephemeral)? {
            return Ok(Self::Ephemeral);
        }
        if holds_any_credential(durable)? {
            return Ok(Self::Durable);
        }
        Ok(Self::default())
    }
}

fn holds_any_credential(storage: &dyn KeyValueStorage) -> Result<bool, AuthError> {
    Ok(storage.has_item(ACCESS_KEY)? || storage.has_item(REFRESH_KEY)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStorage;
    use std::str::FromStr;

    #[test]
    fn detect_defaults_to_durable_when_empty() {
        let durable = MemoryStorage::new();
        let ephemeral = MemoryStorage::new();
        assert_eq!(
            StorageScope::detect(&durable, &ephemeral).unwrap(),
            StorageScope::Durable
        );
    }

    #[test]
    fn detect_prefers_ephemeral_when_both_hold_values() {
        let durable = MemoryStorage::new();
        let ephemeral = MemoryStorage::new();
        durable.set_item(ACCESS_KEY, "a").unwrap();
        ephemeral.set_item(REFRESH_KEY, "r").unwrap();
        assert_eq!(
            StorageScope::detect(&durable, &ephemeral).unwrap(),
            StorageScope::Ephemeral
        );
    }

    #[test]
    fn detect_finds_durable_from_a_single_field() {
        let durable = MemoryStorage::new();
        let ephemeral = MemoryStorage::new();
        durable.set_item(REFRESH_KEY, "r").unwrap();
        assert_eq!(
            StorageScope::detect(&durable, &ephemeral).unwrap(),
            StorageScope::Durable
        );
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!(StorageScope::from_str("durable").unwrap(), StorageScope::Durable);
        assert_eq!(StorageScope::from_str("local").unwrap(), StorageScope::Durable);
        assert_eq!(StorageScope::from_str("Session").unwrap(), StorageScope::Ephemeral);
        assert_eq!(StorageScope::Ephemeral.to_string(), "ephemeral");
        assert!(StorageScope::from_str("cookie").is_err());
    }
}
