// ============================================================================
// Client-side persisted state
// ============================================================================
//
// Simple key -> JSON value storage for state owned by the client: the
// session triple and user-selection preferences. Values are stored as raw
// JSON text; typed access goes through `PersistedValue<T>`.
//
// ============================================================================

pub mod memory;
pub mod persistence;
pub mod persisted;

use crate::core::Result;

pub use memory::MemoryStore;
pub use persisted::PersistedValue;
pub use persistence::FileStore;

/// Raw key -> JSON string storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
