// ============================================================================
// Remote Collection
// ============================================================================
//
// Local mirror of a server-side list with:
//   - read-through caching bounded by a freshness window
//   - optimistic mutations confirmed (or rolled back) by a remote call
//   - debounced updates that collapse a burst into one request
//
// Mutations on the same entity are serialized through a per-entity async
// lock; mutations on different entities run concurrently. Snapshots are
// cheap clones of a persistent vector.
//
// ============================================================================

use super::config::SyncConfig;
use super::mutation::{Mutation, PendingMutation, RemoteOperation};
use super::notify::Notifier;
use super::patch::{Patch, position_of};
use super::state::CollectionState;
use crate::cache::CacheEntry;
use crate::core::{ApiError, Result, SyncEntity, SyncError};
use crate::http::ApiClient;
use im::Vector;
use reqwest::Method;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How a read may be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Skip the cache and always hit the network
    pub force: bool,
}

impl ReadOptions {
    pub fn cached() -> Self {
        Self { force: false }
    }

    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Point-in-time view of a collection
#[derive(Debug, Clone)]
pub struct CollectionSnapshot<T: Clone> {
    pub items: Vector<T>,
    pub state: CollectionState,
    pub error: Option<ApiError>,
    pub version: u64,
    pub fetched_at: Option<Instant>,
}

impl<T: SyncEntity> CollectionSnapshot<T> {
    pub fn get(&self, entity_id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.entity_id() == entity_id)
    }

    pub fn can_retry(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state == CollectionState::Loading
    }
}

struct CollectionData<T: Clone> {
    items: Vector<T>,
    fetched_at: Option<Instant>,
    loading: usize,
    outstanding: usize,
    last_error: Option<ApiError>,
    version: u64,
}

impl<T: Clone> CollectionData<T> {
    fn state(&self) -> CollectionState {
        if self.loading > 0 {
            CollectionState::Loading
        } else if self.outstanding > 0 {
            CollectionState::Mutating
        } else if self.last_error.is_some() {
            CollectionState::Error
        } else {
            CollectionState::Idle
        }
    }
}

struct DebounceSlot<T> {
    /// Rollback target: the last value the server accepted
    origin: T,
    generation: u64,
    operation: RemoteOperation,
    handle: Option<JoinHandle<()>>,
}

struct CollectionInner<T: Clone> {
    key: String,
    source: String,
    client: ApiClient,
    notifier: Notifier,
    config: SyncConfig,
    data: Mutex<CollectionData<T>>,
    entity_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    debounced: Mutex<HashMap<String, DebounceSlot<T>>>,
    changes: watch::Sender<u64>,
}

/// Optimistically mutated mirror of a remote list
pub struct RemoteCollection<T: Clone> {
    inner: Arc<CollectionInner<T>>,
}

impl<T: Clone> Clone for RemoteCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: SyncEntity> RemoteCollection<T> {
    /// `source` is the authorized GET route returning a JSON array.
    pub fn new(
        key: impl Into<String>,
        source: impl Into<String>,
        client: ApiClient,
        notifier: Notifier,
        config: SyncConfig,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(CollectionInner {
                key: key.into(),
                source: source.into(),
                client,
                notifier,
                config,
                data: Mutex::new(CollectionData {
                    items: Vector::new(),
                    fetched_at: None,
                    loading: 0,
                    outstanding: 0,
                    last_error: None,
                    version: 0,
                }),
                entity_locks: Mutex::new(HashMap::new()),
                debounced: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn snapshot(&self) -> CollectionSnapshot<T> {
        let data = self.data();
        CollectionSnapshot {
            items: data.items.clone(),
            state: data.state(),
            error: data.last_error.clone(),
            version: data.version,
            fetched_at: data.fetched_at,
        }
    }

    pub fn items(&self) -> Vector<T> {
        self.data().items.clone()
    }

    pub fn get(&self, entity_id: &str) -> Option<T> {
        let data = self.data();
        position_of(&data.items, entity_id).map(|pos| data.items[pos].clone())
    }

    pub fn state(&self) -> CollectionState {
        self.data().state()
    }

    pub fn last_error(&self) -> Option<ApiError> {
        self.data().last_error.clone()
    }

    /// Mutations applied locally but not yet confirmed
    pub fn pending_mutations(&self) -> usize {
        self.data().outstanding
    }

    /// Receiver that observes a new version after every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    pub fn cache_entry(&self) -> Option<CacheEntry<Vector<T>>> {
        let data = self.data();
        data.fetched_at
            .map(|at| CacheEntry::at(data.items.clone(), at))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Items when the last fetch is within the freshness window.
    pub fn try_read_cached(&self) -> Option<Vector<T>> {
        let entry = self.cache_entry()?;
        entry
            .is_fresh(self.inner.config.freshness_window)
            .then_some(entry.value)
    }

    pub async fn read(&self, options: ReadOptions) -> std::result::Result<Vector<T>, ApiError> {
        if !options.force {
            if let Some(items) = self.try_read_cached() {
                debug!(collection = %self.inner.key, "served from cache");
                return Ok(items);
            }
        }

        {
            let mut data = self.data();
            data.loading += 1;
            self.bump(&mut data);
        }

        let result = self
            .inner
            .client
            .authorized_request(Method::GET, &self.inner.source, None, &[], None)
            .await;

        let mut data = self.data();
        data.loading = data.loading.saturating_sub(1);
        let outcome = match result {
            Ok(body) => {
                let items = decode_items::<T>(&self.inner.key, body);
                debug!(collection = %self.inner.key, count = items.len(), "collection fetched");
                data.items = items.clone();
                data.fetched_at = Some(Instant::now());
                data.last_error = None;
                Ok(items)
            }
            Err(err) => {
                warn!(collection = %self.inner.key, error = %err, "collection fetch failed");
                data.last_error = Some(err.clone());
                Err(err)
            }
        };
        self.bump(&mut data);
        outcome
    }

    /// Re-issue the fetch after an error.
    pub async fn retry(&self) -> std::result::Result<Vector<T>, ApiError> {
        self.read(ReadOptions::forced()).await
    }

    /// Mark the cached items stale; the next read goes to the network.
    pub fn invalidate(&self) {
        let mut data = self.data();
        data.fetched_at = None;
        self.bump(&mut data);
    }

    /// Replace the items with data obtained elsewhere and mark them fresh.
    pub fn seed(&self, items: impl IntoIterator<Item = T>) {
        let mut data = self.data();
        data.items = items.into_iter().collect();
        data.fetched_at = Some(Instant::now());
        data.last_error = None;
        self.bump(&mut data);
    }

    // ========================================================================
    // Optimistic mutations
    // ========================================================================

    /// Apply `mutation` locally, then confirm it remotely.
    ///
    /// On failure the local change is reverted, an error notification is
    /// raised and the error is returned. On success the entity is reconciled
    /// with the response and returned (`None` for removals).
    pub async fn mutate(&self, mutation: Mutation<T>) -> Result<Option<T>> {
        let entity_id = mutation.entity_id().to_string();
        self.flush_pending_debounce(&entity_id).await;

        let lock = self.entity_lock(mutation.entity_id());
        let guard = lock.lock_owned().await;
        match self.apply_optimistic(mutation) {
            Ok(pending) => self.settle(pending, guard).await,
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Fire-and-forget variant of `mutate`.
    ///
    /// When the entity is idle the optimistic change is visible before this
    /// returns. If an earlier mutation is in flight, or a debounced burst is
    /// waiting to be sent, it is applied once those settle.
    pub fn submit(&self, mutation: Mutation<T>) -> JoinHandle<Result<Option<T>>> {
        let this = self.clone();
        if self.has_pending_debounce(mutation.entity_id()) {
            return tokio::spawn(async move { this.mutate(mutation).await });
        }
        let lock = self.entity_lock(mutation.entity_id());
        match lock.try_lock_owned() {
            Ok(guard) => match self.apply_optimistic(mutation) {
                Ok(pending) => tokio::spawn(async move { this.settle(pending, guard).await }),
                Err(err) => tokio::spawn(async move { Err(err) }),
            },
            Err(_) => tokio::spawn(async move { this.mutate(mutation).await }),
        }
    }

    fn apply_optimistic(&self, mutation: Mutation<T>) -> Result<PendingMutation<T>> {
        let mut data = self.data();
        let pending = mutation.resolve(&data.items, &self.inner.key)?;
        if !pending.patch.apply(&mut data.items) {
            return Err(SyncError::EntityNotFound(
                self.inner.key.clone(),
                pending.entity_id.clone(),
            ));
        }
        data.outstanding += 1;
        self.bump(&mut data);
        debug!(collection = %self.inner.key, mutation = %pending.id, entity = %pending.entity_id, "optimistic change applied");
        Ok(pending)
    }

    async fn settle(
        &self,
        pending: PendingMutation<T>,
        guard: OwnedMutexGuard<()>,
    ) -> Result<Option<T>> {
        let PendingMutation {
            id,
            entity_id,
            patch,
            inverse,
            operation,
        } = pending;

        let result = self
            .inner
            .client
            .authorized_request(
                operation.method.clone(),
                &operation.path,
                operation.body.clone(),
                &[],
                operation.retry,
            )
            .await;

        let outcome = {
            let mut data = self.data();
            data.outstanding = data.outstanding.saturating_sub(1);
            let outcome = match result {
                Ok(response) => {
                    let reconciled = reconcile(&mut data.items, &patch, &response);
                    if let Patch::Update { after, .. } = &patch {
                        let mut confirmed = after.clone();
                        confirmed.reconcile(&response);
                        self.rebase_burst(&entity_id, confirmed);
                    }
                    if let Some(at) = data.fetched_at.as_mut() {
                        *at = Instant::now();
                    }
                    debug!(collection = %self.inner.key, mutation = %id, "mutation confirmed");
                    Ok(reconciled)
                }
                Err(err) => {
                    // A newer burst owns the visible value; only its rollback
                    // target moves back to what the server still holds.
                    let rebased = match &inverse {
                        Patch::Update { after: restored, .. } => {
                            self.rebase_burst(&entity_id, restored.clone())
                        }
                        _ => false,
                    };
                    if rebased {
                        debug!(collection = %self.inner.key, mutation = %id, "rollback folded into pending burst");
                    } else if !inverse.apply(&mut data.items) {
                        warn!(collection = %self.inner.key, mutation = %id, "rollback target no longer present");
                    }
                    warn!(collection = %self.inner.key, mutation = %id, error = %err, "mutation rolled back");
                    Err(err)
                }
            };
            self.bump(&mut data);
            outcome
        };

        drop(guard);
        self.release_entity_lock(&entity_id);

        match (&outcome, operation.success_message) {
            (Ok(_), Some(message)) => {
                self.inner.notifier.success(message);
            }
            (Err(err), _) => {
                self.inner.notifier.error(err.to_string());
            }
            (Ok(_), None) => {}
        }
        outcome.map_err(SyncError::from)
    }

    // ========================================================================
    // Debounced updates
    // ========================================================================

    /// Apply `change` locally now and send `operation` once the entity has
    /// been quiet for the debounce window.
    ///
    /// Only the last operation of a burst is sent. If it fails, the entity
    /// reverts to the last value the server accepted before the burst.
    /// A burst started while an earlier request for the same entity is in
    /// flight is sent after it and keeps its visible value if that request
    /// fails. Must be called from within a Tokio runtime.
    pub fn update_debounced<F>(
        &self,
        entity_id: &str,
        change: F,
        operation: RemoteOperation,
    ) -> Result<T>
    where
        F: FnOnce(&mut T),
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SyncError::Task(
                "debounced updates require a Tokio runtime".to_string(),
            ));
        }

        let mut data = self.data();
        let pos = position_of(&data.items, entity_id).ok_or_else(|| {
            SyncError::EntityNotFound(self.inner.key.clone(), entity_id.to_string())
        })?;
        let before = data.items[pos].clone();
        let mut after = before.clone();
        change(&mut after);
        data.items.set(pos, after.clone());
        self.bump(&mut data);

        // Held together with `data` so a settling request sees the slot.
        let mut slots = self.debounced();
        let slot = slots
            .entry(entity_id.to_string())
            .or_insert_with(|| DebounceSlot {
                origin: before,
                generation: 0,
                operation: operation.clone(),
                handle: None,
            });
        slot.generation += 1;
        slot.operation = operation;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        let generation = slot.generation;
        let window = self.inner.config.debounce_window;
        let this = self.clone();
        let id = entity_id.to_string();
        slot.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            this.flush_debounced(&id, generation).await;
        }));

        Ok(after)
    }

    pub fn has_pending_debounce(&self, entity_id: &str) -> bool {
        self.debounced().contains_key(entity_id)
    }

    async fn flush_debounced(&self, entity_id: &str, generation: u64) {
        let slot = {
            let mut slots = self.debounced();
            match slots.get(entity_id) {
                Some(slot) if slot.generation == generation => slots.remove(entity_id),
                _ => None,
            }
        };
        if let Some(slot) = slot {
            self.send_debounced(entity_id, slot).await;
        }
    }

    /// Send a burst still inside its window right away.
    async fn flush_pending_debounce(&self, entity_id: &str) {
        let slot = self.debounced().remove(entity_id);
        if let Some(mut slot) = slot {
            if let Some(handle) = slot.handle.take() {
                handle.abort();
            }
            self.send_debounced(entity_id, slot).await;
        }
    }

    async fn send_debounced(&self, entity_id: &str, slot: DebounceSlot<T>) {
        let lock = self.entity_lock(entity_id);
        let guard = lock.lock_owned().await;

        let pending = {
            let mut data = self.data();
            let Some(pos) = position_of(&data.items, entity_id) else {
                drop(data);
                drop(guard);
                self.release_entity_lock(entity_id);
                debug!(collection = %self.inner.key, entity = %entity_id, "debounced entity removed before flush");
                return;
            };
            let current = data.items[pos].clone();
            data.outstanding += 1;
            self.bump(&mut data);
            PendingMutation::new(
                Patch::Update {
                    before: slot.origin,
                    after: current,
                },
                slot.operation,
            )
        };

        debug!(collection = %self.inner.key, entity = %entity_id, "flushing debounced update");
        // Errors are surfaced through the notifier and the rollback.
        let _ = self.settle(pending, guard).await;
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn data(&self) -> MutexGuard<'_, CollectionData<T>> {
        self.inner
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn debounced(&self) -> MutexGuard<'_, HashMap<String, DebounceSlot<T>>> {
        self.inner
            .debounced
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Point an open burst at a new rollback target. `false` when none.
    fn rebase_burst(&self, entity_id: &str, server_value: T) -> bool {
        match self.debounced().get_mut(entity_id) {
            Some(slot) => {
                slot.origin = server_value;
                true
            }
            None => false,
        }
    }

    fn entity_lock(&self, entity_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .inner
            .entity_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            locks
                .entry(entity_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn release_entity_lock(&self, entity_id: &str) {
        let mut locks = self
            .inner
            .entity_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = locks
            .get(entity_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(entity_id);
        }
    }

    fn bump(&self, data: &mut CollectionData<T>) {
        data.version += 1;
        self.inner.changes.send_replace(data.version);
    }
}

/// Merge the server response into the entity the patch produced.
fn reconcile<T: SyncEntity>(items: &mut Vector<T>, patch: &Patch<T>, response: &JsonValue) -> Option<T> {
    if patch.is_removal() {
        return None;
    }
    let pos = position_of(items, patch.entity_id())?;
    let mut item = items[pos].clone();
    item.reconcile(response);
    items.set(pos, item.clone());
    Some(item)
}

/// Decode a list payload, skipping elements that do not match `T`.
pub(crate) fn decode_items<T: SyncEntity>(collection: &str, body: JsonValue) -> Vector<T> {
    let JsonValue::Array(elements) = body else {
        warn!(collection = %collection, "expected a JSON array, treating as empty");
        return Vector::new();
    };

    elements
        .into_iter()
        .filter_map(|element| match serde_json::from_value::<T>(element) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(collection = %collection, error = %err, "skipping malformed element");
                None
            }
        })
        .collect()
}
