use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Key holding the access credential.
pub const ACCESS_KEY: &str = "access_token";
/// Key holding the refresh credential.
pub const REFRESH_KEY: &str = "refresh_token";

const STORAGE_FILE_VERSION: u32 = 1;
const STORAGE_FILE_NAME: &str = "credentials.toml";

/// String key/value storage backing one credential scope.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError>;
    fn remove_item(&self, key: &str) -> Result<(), AuthError>;

    /// Whether the key holds a non-empty value.
    fn has_item(&self, key: &str) -> Result<bool, AuthError> {
        Ok(self
            .get_item(key)?
            .map(|value| !value.is_empty())
            .unwrap_or(false))
    }
}

/// Process-lifetime storage. Used for the ephemeral scope.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// File-backed storage using a single TOML file. Used for the durable scope.
///
/// # Example
/// ```no_run
/// use bearer_relay::auth::{FileStorage, KeyValueStorage};
///
/// let storage = FileStorage::new(std::path::PathBuf::from("/tmp/bearer-relay"));
/// storage.set_item("access_token", "abc")?;
/// assert_eq!(storage.get_item("access_token")?.as_deref(), Some("abc"));
/// # Ok::<(), bearer_relay::auth::AuthError>(())
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            path: base_dir.join(STORAGE_FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn new_default() -> Self {
        Self::new(default_storage_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_items(&self) -> Result<BTreeMap<String, String>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        let file: StorageFile = toml::from_str(&raw)?;
        Ok(file.items)
    }

    fn write_items(&self, items: BTreeMap<String, String>) -> Result<(), AuthError> {
        if items.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(AuthError::Storage(err.to_string())),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = StorageFile {
            version: STORAGE_FILE_VERSION,
            saved_at: Utc::now(),
            items,
        };
        let serialized = toml::to_string(&file)?;
        fs::write(&self.path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_items()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_items()?;
        items.insert(key.to_string(), value.to_string());
        self.write_items(items)
    }

    fn remove_item(&self, key: &str) -> Result<(), AuthError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_items()?;
        if items.remove(key).is_none() {
            return Ok(());
        }
        self.write_items(items)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

/// Default durable storage directory (`~/.bearer-relay`).
pub fn default_storage_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".bearer-relay"))
        .unwrap_or_else(|| PathBuf::from(".bearer-relay"))
}
