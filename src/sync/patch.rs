// ============================================================================
// Reversible collection patches
// ============================================================================
//
// Command Pattern over an ordered collection: every patch knows its own
// inverse, so an optimistic change can be undone exactly.
//
// Invariant: apply(inverse(p), apply(p, S)) == S
//
// ============================================================================

use crate::core::SyncEntity;
use im::Vector;

#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    /// Place `item` at `index` (clamped to the collection length)
    Insert { index: usize, item: T },

    /// Replace the entity identified by `before` with `after`
    Update { before: T, after: T },

    /// Remove `item`, remembering where it was
    Remove { index: usize, item: T },
}

impl<T: SyncEntity> Patch<T> {
    /// Id of the entity this patch leaves behind (or removes).
    pub fn entity_id(&self) -> &str {
        match self {
            Patch::Insert { item, .. } | Patch::Remove { item, .. } => item.entity_id(),
            Patch::Update { after, .. } => after.entity_id(),
        }
    }

    pub fn inverse(&self) -> Patch<T> {
        match self {
            Patch::Insert { index, item } => Patch::Remove {
                index: *index,
                item: item.clone(),
            },
            Patch::Update { before, after } => Patch::Update {
                before: after.clone(),
                after: before.clone(),
            },
            Patch::Remove { index, item } => Patch::Insert {
                index: *index,
                item: item.clone(),
            },
        }
    }

    /// Apply to `items`. Returns `false` when the targeted entity is absent.
    pub fn apply(&self, items: &mut Vector<T>) -> bool {
        match self {
            Patch::Insert { index, item } => {
                let at = (*index).min(items.len());
                items.insert(at, item.clone());
                true
            }
            Patch::Update { before, after } => match position_of(items, before.entity_id()) {
                Some(pos) => {
                    items.set(pos, after.clone());
                    true
                }
                None => false,
            },
            Patch::Remove { index, item } => match locate(items, *index, item.entity_id()) {
                Some(pos) => {
                    items.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Patch::Remove { .. })
    }
}

pub(crate) fn position_of<T: SyncEntity>(items: &Vector<T>, entity_id: &str) -> Option<usize> {
    items.iter().position(|item| item.entity_id() == entity_id)
}

/// `hint` when it still holds `entity_id`, otherwise the first match.
fn locate<T: SyncEntity>(items: &Vector<T>, hint: usize, entity_id: &str) -> Option<usize> {
    match items.get(hint) {
        Some(item) if item.entity_id() == entity_id => Some(hint),
        _ => position_of(items, entity_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Line {
        id: String,
        qty: u32,
    }

    impl SyncEntity for Line {
        fn entity_id(&self) -> &str {
            &self.id
        }
    }

    fn line(id: &str, qty: u32) -> Line {
        Line {
            id: id.to_string(),
            qty,
        }
    }

    fn sample() -> Vector<Line> {
        Vector::from(vec![line("a", 1), line("b", 2), line("c", 3)])
    }

    fn assert_round_trip(patch: Patch<Line>) {
        let original = sample();
        let mut items = original.clone();
        assert!(patch.apply(&mut items));
        assert_ne!(items, original);
        assert!(patch.inverse().apply(&mut items));
        assert_eq!(items, original);
    }

    #[test]
    fn test_update_rollback_restores_state() {
        assert_round_trip(Patch::Update {
            before: line("b", 2),
            after: line("b", 9),
        });
    }

    #[test]
    fn test_remove_rollback_restores_order() {
        assert_round_trip(Patch::Remove {
            index: 0,
            item: line("a", 1),
        });
        assert_round_trip(Patch::Remove {
            index: 2,
            item: line("c", 3),
        });
    }

    #[test]
    fn test_insert_rollback() {
        assert_round_trip(Patch::Insert {
            index: 1,
            item: line("z", 5),
        });
    }

    #[test]
    fn test_insert_index_is_clamped() {
        let mut items = sample();
        Patch::Insert {
            index: 99,
            item: line("z", 1),
        }
        .apply(&mut items);
        assert_eq!(items.back().map(|l| l.id.as_str()), Some("z"));
    }

    #[test]
    fn test_remove_prefers_recorded_position() {
        let mut items = Vector::from(vec![line("a", 1), line("b", 2), line("a", 7)]);
        let patch = Patch::Remove {
            index: 2,
            item: line("a", 7),
        };
        assert!(patch.apply(&mut items));
        assert_eq!(items, Vector::from(vec![line("a", 1), line("b", 2)]));

        // Stale position falls back to a lookup by id.
        let mut items = Vector::from(vec![line("b", 2), line("c", 3)]);
        let patch = Patch::Remove {
            index: 0,
            item: line("c", 3),
        };
        assert!(patch.apply(&mut items));
        assert_eq!(items, Vector::from(vec![line("b", 2)]));
    }

    #[test]
    fn test_missing_entity_is_reported() {
        let mut items = sample();
        let patch = Patch::Update {
            before: line("x", 1),
            after: line("x", 2),
        };
        assert!(!patch.apply(&mut items));
        assert_eq!(items, sample());
    }
}
