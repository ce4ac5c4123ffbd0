// ============================================================================
// Mutation intents
// ============================================================================
//
// A `Mutation` is what the caller wants; a `PendingMutation` is the same
// intent resolved against the current collection: a concrete patch, its
// inverse, and the remote operation that confirms it.
//
// ============================================================================

use super::patch::{Patch, position_of};
use super::state::MutationId;
use crate::core::{EntityId, Result, SyncEntity, SyncError};
use crate::http::RetryPolicy;
use im::Vector;
use reqwest::Method;
use serde_json::Value as JsonValue;

/// Remote call that confirms an optimistic change
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOperation {
    pub method: Method,
    pub path: String,
    pub body: Option<JsonValue>,
    /// Per-call retry override; `None` uses the client policy
    pub retry: Option<RetryPolicy>,
    /// Notification raised once the server confirms
    pub success_message: Option<String>,
}

impl RemoteOperation {
    /// Non-idempotent methods are sent once; others use the client policy.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let retry = if method == Method::POST {
            Some(RetryPolicy::no_retry())
        } else {
            None
        };
        Self {
            method,
            path: path.into(),
            body: None,
            retry,
            success_message: None,
        }
    }

    pub fn post(path: impl Into<String>, body: JsonValue) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: JsonValue) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn on_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }
}

type Change<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Requested change to a collection
pub enum Mutation<T> {
    Insert {
        item: T,
        index: Option<usize>,
        operation: RemoteOperation,
    },
    Update {
        entity_id: EntityId,
        change: Change<T>,
        operation: RemoteOperation,
    },
    Remove {
        entity_id: EntityId,
        operation: RemoteOperation,
    },
}

impl<T: SyncEntity> Mutation<T> {
    /// Append `item`.
    pub fn insert(item: T, operation: RemoteOperation) -> Self {
        Mutation::Insert {
            item,
            index: None,
            operation,
        }
    }

    pub fn insert_at(index: usize, item: T, operation: RemoteOperation) -> Self {
        Mutation::Insert {
            item,
            index: Some(index),
            operation,
        }
    }

    pub fn update<F>(entity_id: impl Into<EntityId>, change: F, operation: RemoteOperation) -> Self
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        Mutation::Update {
            entity_id: entity_id.into(),
            change: Box::new(change),
            operation,
        }
    }

    pub fn remove(entity_id: impl Into<EntityId>, operation: RemoteOperation) -> Self {
        Mutation::Remove {
            entity_id: entity_id.into(),
            operation,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Mutation::Insert { item, .. } => item.entity_id(),
            Mutation::Update { entity_id, .. } | Mutation::Remove { entity_id, .. } => entity_id,
        }
    }

    pub fn operation(&self) -> &RemoteOperation {
        match self {
            Mutation::Insert { operation, .. }
            | Mutation::Update { operation, .. }
            | Mutation::Remove { operation, .. } => operation,
        }
    }

    /// Resolve the intent against `items`.
    pub(crate) fn resolve(self, items: &Vector<T>, collection: &str) -> Result<PendingMutation<T>> {
        let missing = |id: &str| SyncError::EntityNotFound(collection.to_string(), id.to_string());
        let (patch, operation) = match self {
            Mutation::Insert {
                item,
                index,
                operation,
            } => {
                if position_of(items, item.entity_id()).is_some() {
                    return Err(SyncError::DuplicateEntity(
                        collection.to_string(),
                        item.entity_id().to_string(),
                    ));
                }
                let index = index.unwrap_or(items.len()).min(items.len());
                (Patch::Insert { index, item }, operation)
            }
            Mutation::Update {
                entity_id,
                change,
                operation,
            } => {
                let pos = position_of(items, &entity_id).ok_or_else(|| missing(&entity_id))?;
                let before = items[pos].clone();
                let mut after = before.clone();
                change(&mut after);
                (Patch::Update { before, after }, operation)
            }
            Mutation::Remove {
                entity_id,
                operation,
            } => {
                let index = position_of(items, &entity_id).ok_or_else(|| missing(&entity_id))?;
                let item = items[index].clone();
                (Patch::Remove { index, item }, operation)
            }
        };

        Ok(PendingMutation::new(patch, operation))
    }
}

impl<T> std::fmt::Debug for Mutation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::Insert { index, operation, .. } => f
                .debug_struct("Insert")
                .field("index", index)
                .field("operation", operation)
                .finish(),
            Mutation::Update {
                entity_id,
                operation,
                ..
            } => f
                .debug_struct("Update")
                .field("entity_id", entity_id)
                .field("operation", operation)
                .finish(),
            Mutation::Remove {
                entity_id,
                operation,
            } => f
                .debug_struct("Remove")
                .field("entity_id", entity_id)
                .field("operation", operation)
                .finish(),
        }
    }
}

/// An optimistic change awaiting confirmation
#[derive(Debug, Clone)]
pub struct PendingMutation<T> {
    pub id: MutationId,
    pub entity_id: EntityId,
    pub patch: Patch<T>,
    pub inverse: Patch<T>,
    pub operation: RemoteOperation,
}

impl<T: SyncEntity> PendingMutation<T> {
    pub fn new(patch: Patch<T>, operation: RemoteOperation) -> Self {
        Self {
            id: MutationId::new(),
            entity_id: patch.entity_id().to_string(),
            inverse: patch.inverse(),
            patch,
            operation,
        }
    }
}
