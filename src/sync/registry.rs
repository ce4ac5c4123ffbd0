// ============================================================================
// Collection Registry
// ============================================================================

use super::collection::RemoteCollection;
use crate::core::{Result, SyncEntity, SyncError};
use lazy_static::lazy_static;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type AnyCollection = Arc<dyn Any + Send + Sync>;

/// Keyed set of shared collections
///
/// Every consumer asking for the same key gets the same `RemoteCollection`,
/// so an optimistic change made through one handle is visible through all.
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, AnyCollection>>,
}

// Global singleton instance of CollectionRegistry
lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<CollectionRegistry> = Arc::new(CollectionRegistry::new());
}

impl CollectionRegistry {
    /// Get the process-wide registry
    pub fn global() -> &'static Arc<CollectionRegistry> {
        &GLOBAL_REGISTRY
    }

    /// Create a registry that shares nothing with the global one
    ///
    /// Useful for testing.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Return the collection under `key`, creating it with `make` if absent.
    ///
    /// Fails with `TypeMismatch` when `key` holds a collection of another
    /// entity type.
    pub fn get_or_create<T, F>(&self, key: &str, make: F) -> Result<RemoteCollection<T>>
    where
        T: SyncEntity,
        F: FnOnce() -> RemoteCollection<T>,
    {
        if let Some(existing) = self.get::<T>(key)? {
            return Ok(existing);
        }

        let mut collections = self.collections.write()?;
        // Another caller may have won the race between the two locks.
        if let Some(existing) = collections.get(key) {
            return downcast(key, existing);
        }

        let collection = make();
        collections.insert(key.to_string(), Arc::new(collection.clone()));
        log::debug!("registered collection '{}'", key);
        Ok(collection)
    }

    pub fn get<T: SyncEntity>(&self, key: &str) -> Result<Option<RemoteCollection<T>>> {
        let collections = self.collections.read()?;
        collections
            .get(key)
            .map(|existing| downcast(key, existing))
            .transpose()
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.collections.write()?.remove(key).is_some())
    }

    /// Drop every collection whose key starts with `prefix`.
    pub fn remove_prefixed(&self, prefix: &str) -> Result<usize> {
        let mut collections = self.collections.write()?;
        let before = collections.len();
        collections.retain(|key, _| !key.starts_with(prefix));
        Ok(before - collections.len())
    }

    pub fn clear(&self) -> Result<()> {
        self.collections.write()?.clear();
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.collections.read()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<T: SyncEntity>(key: &str, existing: &AnyCollection) -> Result<RemoteCollection<T>> {
    existing
        .downcast_ref::<RemoteCollection<T>>()
        .cloned()
        .ok_or_else(|| {
            log::warn!(
                "collection '{}' requested as {}",
                key,
                std::any::type_name::<T>()
            );
            SyncError::TypeMismatch(key.to_string())
        })
}
