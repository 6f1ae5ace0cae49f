use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::AuthError;
use super::scope::StorageScope;
use super::storage::{KeyValueStorage, ACCESS_KEY, REFRESH_KEY};
use super::token::CredentialPair;

/// Credential pair storage over a durable and an ephemeral backend.
///
/// Exactly one scope is active for reads and writes. [`CredentialStore::clear`]
/// always empties both. Every operation runs under one lock, so a reader never
/// observes a pair that is halfway through being written.
pub struct CredentialStore {
    durable: Arc<dyn KeyValueStorage>,
    ephemeral: Arc<dyn KeyValueStorage>,
    scope: Mutex<StorageScope>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("scope", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Create a store, detecting the active scope from existing contents.
    pub fn new(
        durable: Arc<dyn KeyValueStorage>,
        ephemeral: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, AuthError> {
        let scope = StorageScope::detect(durable.as_ref(), ephemeral.as_ref())?;
        tracing::debug!(%scope, "credential scope detected");
        Ok(Self::with_scope(durable, ephemeral, scope))
    }

    /// Create a store with an explicit active scope.
    pub fn with_scope(
        durable: Arc<dyn KeyValueStorage>,
        ephemeral: Arc<dyn KeyValueStorage>,
        scope: StorageScope,
    ) -> Self {
        Self {
            durable,
            ephemeral,
            scope: Mutex::new(scope),
        }
    }

    pub fn scope(&self) -> StorageScope {
        *self.lock()
    }

    /// Switch the active scope. Stored values are not migrated.
    pub fn set_scope(&self, scope: StorageScope) {
        let mut active = self.lock();
        if *active != scope {
            tracing::debug!(from = %*active, to = %scope, "credential scope switched");
            *active = scope;
        }
    }

    /// Read the pair from the active scope. Absent unless both fields are set.
    pub fn get(&self) -> Result<Option<CredentialPair>, AuthError> {
        let scope = self.lock();
        read_pair(self.backend(*scope))
    }

    /// Current access credential, if a full pair is stored.
    pub fn access_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.get()?.map(|pair| pair.access().to_string()))
    }

    /// Write both fields to the active scope.
    ///
    /// If the second write fails the previous contents are restored, so the
    /// scope never holds one old field and one new field.
    pub fn set(&self, pair: &CredentialPair) -> Result<(), AuthError> {
        let scope = self.lock();
        write_pair(self.backend(*scope), *scope, pair)
    }

    /// Store `pair` in `scope`, make it active, then empty the other scope.
    ///
    /// The other scope is only emptied after the new pair is written, so a
    /// failed write leaves the previous session and scope untouched.
    pub fn replace(&self, scope: StorageScope, pair: &CredentialPair) -> Result<(), AuthError> {
        let mut active = self.lock();
        write_pair(self.backend(scope), scope, pair)?;
        *active = scope;
        remove_pair(self.backend(scope.other()))
    }

    /// Remove both fields from both scopes.
    ///
    /// Every removal is attempted; the first failure is returned.
    pub fn clear(&self) -> Result<(), AuthError> {
        let _scope = self.lock();
        let durable = remove_pair(self.durable.as_ref());
        let ephemeral = remove_pair(self.ephemeral.as_ref());
        durable.and(ephemeral)
    }

    fn backend(&self, scope: StorageScope) -> &dyn KeyValueStorage {
        match scope {
            StorageScope::Durable => self.durable.as_ref(),
            StorageScope::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StorageScope> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_pair(backend: &dyn KeyValueStorage) -> Result<Option<CredentialPair>, AuthError> {
    let access = backend.get_item(ACCESS_KEY)?.unwrap_or_default();
    let refresh = backend.get_item(REFRESH_KEY)?.unwrap_or_default();
    Ok(CredentialPair::new(access, refresh))
}

fn write_pair(
    backend: &dyn KeyValueStorage,
    scope: StorageScope,
    pair: &CredentialPair,
) -> Result<(), AuthError> {
    let previous = read_pair(backend)?;
    let written = backend
        .set_item(ACCESS_KEY, pair.access())
        .and_then(|()| backend.set_item(REFRESH_KEY, pair.refresh()));
    if let Err(err) = written {
        tracing::warn!(%scope, error = %err, "credential write failed, restoring previous pair");
        let restored = match &previous {
            Some(old) => backend
                .set_item(ACCESS_KEY, old.access())
                .and_then(|()| backend.set_item(REFRESH_KEY, old.refresh())),
            None => remove_pair(backend),
        };
        if let Err(restore_err) = restored {
            tracing::warn!(error = %restore_err, "restoring previous credentials failed");
        }
        return Err(err);
    }
    Ok(())
}

fn remove_pair(backend: &dyn KeyValueStorage) -> Result<(), AuthError> {
    let access = backend.remove_item(ACCESS_KEY);
    let refresh = backend.remove_item(REFRESH_KEY);
    access.and(refresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStorage;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair::new(access, refresh).unwrap()
    }

    fn backends() -> (Arc<MemoryStorage>, Arc<MemoryStorage>) {
        (Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn set_then_get_returns_pair() {
        let (durable, ephemeral) = backends();
        let store = CredentialStore::new(durable.clone(), ephemeral).unwrap();
        store.set(&pair("A1", "R1")).unwrap();
        assert_eq!(store.get().unwrap(), Some(pair("A1", "R1")));
        assert_eq!(store.access_token().unwrap().as_deref(), Some("A1"));
        assert_eq!(durable.get_item(ACCESS_KEY).unwrap().as_deref(), Some("A1"));
    }

    #[test]
    fn get_is_absent_when_only_one_field_is_stored() {
        let (durable, ephemeral) = backends();
        durable.set_item(ACCESS_KEY, "A1").unwrap();
        let store = CredentialStore::new(durable, ephemeral).unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn set_writes_only_to_active_ephemeral_scope() {
        let (durable, ephemeral) = backends();
        ephemeral.set_item(REFRESH_KEY, "old").unwrap();
        let store = CredentialStore::new(durable.clone(), ephemeral.clone()).unwrap();
        assert_eq!(store.scope(), StorageScope::Ephemeral);

        store.set(&pair("A2", "R2")).unwrap();

        assert_eq!(ephemeral.get_item(ACCESS_KEY).unwrap().as_deref(), Some("A2"));
        assert_eq!(durable.get_item(ACCESS_KEY).unwrap(), None);
        assert_eq!(durable.get_item(REFRESH_KEY).unwrap(), None);
    }

    #[test]
    fn clear_empties_both_scopes() {
        let (durable, ephemeral) = backends();
        let store = CredentialStore::with_scope(
            durable.clone(),
            ephemeral.clone(),
            StorageScope::Durable,
        );
        store.set(&pair("A1", "R1")).unwrap();
        store.set_scope(StorageScope::Ephemeral);
        store.set(&pair("A2", "R2")).unwrap();

        store.clear().unwrap();

        assert_eq!(store.get().unwrap(), None);
        store.set_scope(StorageScope::Durable);
        assert_eq!(store.get().unwrap(), None);
        assert!(!durable.has_item(ACCESS_KEY).unwrap());
        assert!(!ephemeral.has_item(REFRESH_KEY).unwrap());
    }

    #[test]
    fn set_scope_does_not_migrate_values() {
        let (durable, ephemeral) = backends();
        let store = CredentialStore::new(durable, ephemeral).unwrap();
        store.set(&pair("A1", "R1")).unwrap();
        store.set_scope(StorageScope::Ephemeral);
        assert_eq!(store.get().unwrap(), None);
        store.set_scope(StorageScope::Durable);
        assert_eq!(store.get().unwrap(), Some(pair("A1", "R1")));
    }

    /// Storage whose refresh-key writes fail while `fail` is set.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail: AtomicBool,
    }

    impl KeyValueStorage for FlakyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), AuthError> {
            if key == REFRESH_KEY && self.fail.load(Ordering::SeqCst) {
                return Err(AuthError::Storage("disk full".to_string()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), AuthError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn failed_write_restores_previous_pair() {
        let durable = Arc::new(FlakyStorage::default());
        let store = CredentialStore::with_scope(
            durable.clone(),
            Arc::new(MemoryStorage::new()),
            StorageScope::Durable,
        );
        store.set(&pair("A1", "R1")).unwrap();

        durable.fail.store(true, Ordering::SeqCst);
        let result = store.set(&pair("A2", "R2"));

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(store.get().unwrap(), Some(pair("A1", "R1")));
    }

    #[test]
    fn replace_switches_scope_and_empties_the_other() {
        let (durable, ephemeral) = backends();
        let store = CredentialStore::new(durable.clone(), ephemeral.clone()).unwrap();
        store.set(&pair("A1", "R1")).unwrap();

        store.replace(StorageScope::Ephemeral, &pair("A2", "R2")).unwrap();

        assert_eq!(store.scope(), StorageScope::Ephemeral);
        assert_eq!(store.get().unwrap(), Some(pair("A2", "R2")));
        assert!(!durable.has_item(ACCESS_KEY).unwrap());
        assert!(!durable.has_item(REFRESH_KEY).unwrap());
    }

    #[test]
    fn failed_replace_keeps_previous_session() {
        let ephemeral = Arc::new(FlakyStorage::default());
        ephemeral.fail.store(true, Ordering::SeqCst);
        let durable = Arc::new(MemoryStorage::new());
        let store =
            CredentialStore::with_scope(durable.clone(), ephemeral.clone(), StorageScope::Durable);
        store.set(&pair("A1", "R1")).unwrap();

        let result = store.replace(StorageScope::Ephemeral, &pair("A2", "R2"));

        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert_eq!(store.scope(), StorageScope::Durable);
        assert_eq!(store.get().unwrap(), Some(pair("A1", "R1")));
        assert_eq!(ephemeral.get_item(ACCESS_KEY).unwrap(), None);
    }

    #[test]
    fn failed_first_write_leaves_store_absent() {
        let durable = Arc::new(FlakyStorage::default());
        durable.fail.store(true, Ordering::SeqCst);
        let store = CredentialStore::with_scope(
            durable.clone(),
            Arc::new(MemoryStorage::new()),
            StorageScope::Durable,
        );

        assert!(store.set(&pair("A1", "R1")).is_err());
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(durable.get_item(ACCESS_KEY).unwrap(), None);
    }
}
