use super::KeyValueStore;
use crate::core::Result;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed view over one key of a `KeyValueStore`.
///
/// Reads never fail: a missing key, an unreadable store or a corrupt payload
/// all fall back to `T::default()`.
pub struct PersistedValue<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PersistedValue<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PersistedValue<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> T {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                warn!("Error reading stored key \"{}\": {}", self.key, e);
                return T::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Discarding corrupt value for key \"{}\": {}", self.key, e);
                T::default()
            }
        }
    }

    pub fn save(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&self.key, &raw)
    }

    /// Load, modify and write back. Returns the stored value.
    pub fn update<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        let mut value = self.load();
        f(&mut value);
        self.save(&value)?;
        Ok(value)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key)
    }
}
