// ============================================================================
// Preferences
// ============================================================================
//
// Key -> JSON pairs read on mount and written on change. Unreadable values
// fall back to defaults.
//
// ============================================================================

use super::catalog::ListFilters;
use crate::core::Result;
use crate::selection::VariantSelection;
use crate::storage::{KeyValueStore, PersistedValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const FILTER_STORAGE_KEY: &str = "productListFilters";
pub const DETAIL_STORAGE_KEY: &str = "productDetailState";

/// Last choice made on one product page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredSelection {
    pub selected_color: Option<String>,
    pub selected_size: Option<String>,
    pub quantity: Option<u32>,
}

impl From<&VariantSelection> for StoredSelection {
    fn from(selection: &VariantSelection) -> Self {
        Self {
            selected_color: selection.color.clone(),
            selected_size: selection.size.clone(),
            quantity: Some(selection.quantity),
        }
    }
}

pub type DetailSelections = HashMap<String, StoredSelection>;

#[derive(Clone)]
pub struct Preferences {
    filters: PersistedValue<ListFilters>,
    selections: PersistedValue<DetailSelections>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            filters: PersistedValue::new(Arc::clone(&store), FILTER_STORAGE_KEY),
            selections: PersistedValue::new(store, DETAIL_STORAGE_KEY),
        }
    }

    pub fn filters(&self) -> ListFilters {
        self.filters.load()
    }

    pub fn save_filters(&self, filters: &ListFilters) -> Result<()> {
        self.filters.save(filters)
    }

    pub fn reset_filters(&self) -> Result<()> {
        self.filters.save(&ListFilters::default())
    }

    pub fn selection_for(&self, product_id: &str) -> Option<StoredSelection> {
        self.selections.load().remove(product_id)
    }

    pub fn remember_selection(&self, product_id: &str, selection: &VariantSelection) -> Result<()> {
        let stored = StoredSelection::from(selection);
        self.selections
            .update(|all| {
                all.insert(product_id.to_string(), stored);
            })
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_filters_round_trip_and_reset() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let prefs = Preferences::new(Arc::clone(&store));
        assert!(prefs.filters().is_default());

        let mut filters = ListFilters::default();
        filters.color = "Red".to_string();
        prefs.save_filters(&filters).unwrap();
        assert_eq!(Preferences::new(Arc::clone(&store)).filters().color, "Red");

        prefs.reset_filters().unwrap();
        assert!(prefs.filters().is_default());
    }

    #[test]
    fn test_corrupt_values_fall_back() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(FILTER_STORAGE_KEY, "{not json").unwrap();
        store.set(DETAIL_STORAGE_KEY, "[1,2,3]").unwrap();

        let prefs = Preferences::new(store);
        assert!(prefs.filters().is_default());
        assert!(prefs.selection_for("p1").is_none());
    }

    #[test]
    fn test_selection_is_stored_per_product() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        let mut selection = VariantSelection::new();
        selection.select_color("Red");
        selection.quantity = 2;
        prefs.remember_selection("p1", &selection).unwrap();

        let stored = prefs.selection_for("p1").unwrap();
        assert_eq!(stored.selected_color.as_deref(), Some("Red"));
        assert_eq!(stored.selected_size, None);
        assert_eq!(stored.quantity, Some(2));
        assert!(prefs.selection_for("p2").is_none());
    }
}
