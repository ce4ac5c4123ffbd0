// ============================================================================
// Variant Index
// ============================================================================
//
// Attribute lookups over a variant list:
//   by_color       color -> positions (input order)
//   by_size        size  -> positions (input order)
//   by_color_size  color -> size -> position (last occurrence wins)
//
// Built once per variant list; every query is a hash lookup.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Anything selectable by color and size
pub trait Variant {
    fn variant_id(&self) -> &str;
    fn color(&self) -> Option<&str>;
    fn size(&self) -> Option<&str>;

    /// Units available, when the backend reports it
    fn stock(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct VariantIndex<V> {
    variants: Arc<[V]>,
    by_color: HashMap<String, Vec<usize>>,
    by_size: HashMap<String, Vec<usize>>,
    by_color_size: HashMap<String, HashMap<String, usize>>,
}

impl<V: Variant> VariantIndex<V> {
    pub fn build(variants: impl Into<Arc<[V]>>) -> Self {
        let variants = variants.into();
        let mut by_color: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_size: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_color_size: HashMap<String, HashMap<String, usize>> = HashMap::new();

        for (pos, variant) in variants.iter().enumerate() {
            let color = variant.color().filter(|c| !c.is_empty());
            let size = variant.size().filter(|s| !s.is_empty());

            if let Some(color) = color {
                by_color.entry(color.to_string()).or_default().push(pos);
            }
            if let Some(size) = size {
                by_size.entry(size.to_string()).or_default().push(pos);
            }
            if let (Some(color), Some(size)) = (color, size) {
                by_color_size
                    .entry(color.to_string())
                    .or_default()
                    .insert(size.to_string(), pos);
            }
        }

        Self {
            variants,
            by_color,
            by_size,
            by_color_size,
        }
    }

    /// Resolve a selection to a concrete variant.
    ///
    /// Color and size: exact match. Size only: first variant of that size.
    /// Color only: incomplete, so `None`.
    pub fn resolve(&self, color: Option<&str>, size: Option<&str>) -> Option<&V> {
        match (color, size) {
            (Some(color), Some(size)) => self.exact(color, size),
            (None, Some(size)) => self
                .by_size
                .get(size)
                .and_then(|positions| positions.first())
                .map(|&pos| &self.variants[pos]),
            _ => None,
        }
    }

    pub fn is_valid_combination(&self, color: &str, size: &str) -> bool {
        self.exact(color, size).is_some()
    }

    pub fn variants_for_color(&self, color: &str) -> Vec<&V> {
        self.collect(self.by_color.get(color))
    }

    pub fn variants_for_size(&self, size: &str) -> Vec<&V> {
        self.collect(self.by_size.get(size))
    }

    /// Distinct colors, sorted
    pub fn colors(&self) -> Vec<&str> {
        sorted_keys(&self.by_color)
    }

    /// Distinct sizes, sorted
    pub fn sizes(&self) -> Vec<&str> {
        sorted_keys(&self.by_size)
    }

    pub fn find(&self, variant_id: &str) -> Option<&V> {
        self.variants.iter().find(|v| v.variant_id() == variant_id)
    }

    pub fn variants(&self) -> &Arc<[V]> {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    fn exact(&self, color: &str, size: &str) -> Option<&V> {
        self.by_color_size
            .get(color)
            .and_then(|sizes| sizes.get(size))
            .map(|&pos| &self.variants[pos])
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<&V> {
        positions
            .map(|positions| positions.iter().map(|&pos| &self.variants[pos]).collect())
            .unwrap_or_default()
    }
}

fn sorted_keys<T>(map: &HashMap<String, T>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

/// Variant list with an index built on first use
///
/// Replacing the list with a different allocation discards the index.
#[derive(Debug)]
pub struct IndexedVariants<V> {
    source: Arc<[V]>,
    index: OnceLock<VariantIndex<V>>,
}

impl<V: Variant> IndexedVariants<V> {
    pub fn new(source: impl Into<Arc<[V]>>) -> Self {
        Self {
            source: source.into(),
            index: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &Arc<[V]> {
        &self.source
    }

    pub fn index(&self) -> &VariantIndex<V> {
        self.index
            .get_or_init(|| VariantIndex::build(Arc::clone(&self.source)))
    }

    pub fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    /// Swap in a new list. Returns `true` if the index was invalidated.
    pub fn replace(&mut self, source: Arc<[V]>) -> bool {
        if Arc::ptr_eq(&self.source, &source) {
            return false;
        }
        self.source = source;
        self.index = OnceLock::new();
        true
    }
}

impl<V: Variant> Default for IndexedVariants<V> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct V {
        id: &'static str,
        color: Option<&'static str>,
        size: Option<&'static str>,
    }

    impl Variant for V {
        fn variant_id(&self) -> &str {
            self.id
        }
        fn color(&self) -> Option<&str> {
            self.color
        }
        fn size(&self) -> Option<&str> {
            self.size
        }
    }

    fn v(id: &'static str, color: Option<&'static str>, size: Option<&'static str>) -> V {
        V { id, color, size }
    }

    fn catalog() -> Vec<V> {
        vec![
            v("1", Some("Red"), Some("M")),
            v("2", Some("Blue"), Some("M")),
            v("3", Some("Red"), Some("L")),
            v("4", None, Some("S")),
            v("5", Some("Green"), None),
        ]
    }

    #[test]
    fn test_exact_resolution() {
        let index = VariantIndex::build(catalog());
        assert_eq!(index.resolve(Some("Red"), Some("L")).map(|v| v.id), Some("3"));
        assert!(index.resolve(Some("Blue"), Some("L")).is_none());
    }

    #[test]
    fn test_size_only_takes_first_in_input_order() {
        let index = VariantIndex::build(catalog());
        assert_eq!(index.resolve(None, Some("M")).map(|v| v.id), Some("1"));
    }

    #[test]
    fn test_color_only_is_incomplete() {
        let index = VariantIndex::build(catalog());
        assert!(index.resolve(Some("Red"), None).is_none());
        assert!(index.resolve(None, None).is_none());
    }

    #[test]
    fn test_valid_combination_matches_linear_scan() {
        let variants = catalog();
        let index = VariantIndex::build(variants.clone());
        for color in ["Red", "Blue", "Green", "Black"] {
            for size in ["S", "M", "L", "XL"] {
                let expected = variants
                    .iter()
                    .any(|v| v.color == Some(color) && v.size == Some(size));
                assert_eq!(index.is_valid_combination(color, size), expected, "{color}/{size}");
            }
        }
    }

    #[test]
    fn test_partial_attributes_are_indexed_per_map() {
        let index = VariantIndex::build(catalog());
        assert_eq!(index.colors(), vec!["Blue", "Green", "Red"]);
        assert_eq!(index.sizes(), vec!["L", "M", "S"]);
        assert_eq!(index.variants_for_color("Red").len(), 2);
        assert_eq!(index.variants_for_size("S")[0].id, "4");
    }

    #[test]
    fn test_empty_list() {
        let index = VariantIndex::<V>::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.resolve(Some("Red"), Some("M")).is_none());
        assert!(!index.is_valid_combination("Red", "M"));
        assert!(index.colors().is_empty());
    }

    #[test]
    fn test_indexed_variants_rebuild_on_new_source() {
        let mut indexed = IndexedVariants::new(catalog());
        assert!(!indexed.is_built());
        assert_eq!(indexed.index().len(), 5);
        assert!(indexed.is_built());

        let same = Arc::clone(indexed.source());
        assert!(!indexed.replace(same));
        assert!(indexed.is_built());

        assert!(indexed.replace(Arc::from(vec![v("9", Some("Red"), Some("XL"))])));
        assert!(!indexed.is_built());
        assert!(indexed.index().is_valid_combination("Red", "XL"));
    }
}
