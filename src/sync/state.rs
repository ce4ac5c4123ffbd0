use std::sync::atomic::{AtomicU64, Ordering};

/// Global mutation ID counter
static NEXT_MUTATION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an in-flight mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(pub u64);

impl MutationId {
    pub fn new() -> Self {
        MutationId(NEXT_MUTATION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MutationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mut_{}", self.0)
    }
}

/// Lifecycle of a synchronized collection
///
/// ```text
/// Idle/Error ──read(force)──> Loading ──ok──> Idle
///                                └──err──> Error
/// Idle ──mutate──> Mutating ──ok / rollback──> Idle
/// ```
///
/// A failed mutation returns to `Idle`: only that change is undone, the
/// collection as a whole stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Idle,
    Loading,
    Mutating,
    Error,
}

impl CollectionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, CollectionState::Loading | CollectionState::Mutating)
    }
}

impl std::fmt::Display for CollectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionState::Idle => write!(f, "IDLE"),
            CollectionState::Loading => write!(f, "LOADING"),
            CollectionState::Mutating => write!(f, "MUTATING"),
            CollectionState::Error => write!(f, "ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_id_generation() {
        let id1 = MutationId::new();
        let id2 = MutationId::new();
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("mut_"));
    }

    #[test]
    fn test_busy_states() {
        assert!(CollectionState::Loading.is_busy());
        assert!(CollectionState::Mutating.is_busy());
        assert!(!CollectionState::Idle.is_busy());
        assert!(!CollectionState::Error.is_busy());
    }
}
