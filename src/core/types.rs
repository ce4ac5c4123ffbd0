use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Server-assigned identifier of a synchronized entity.
pub type EntityId = String;

/// An entity mirrored from a server-owned collection.
///
/// Identifiers must be stable and unique within a collection; the
/// optimistic layer keys patches, rollbacks and per-entity serialization on
/// them.
pub trait SyncEntity: Clone + Send + Sync + DeserializeOwned + 'static {
    fn entity_id(&self) -> &str;

    /// Overwrite optimistic values with authoritative fields from the
    /// server's response to a successful mutation.
    fn reconcile(&mut self, _response: &JsonValue) {}
}
