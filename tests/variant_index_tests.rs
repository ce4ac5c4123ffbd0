/// Variant index agreement tests
///
/// Builds indexes over generated variant lists (including missing and
/// duplicated attributes) and checks every lookup against a plain linear
/// scan of the same list.
/// Run with: cargo test --test variant_index_tests
use std::sync::Arc;
use storesync::{IndexedVariants, Variant, VariantIndex};

const COLORS: [&str; 5] = ["Red", "Blue", "Green", "Black", ""];
const SIZES: [&str; 5] = ["XS", "S", "M", "L", ""];

#[derive(Debug, Clone, PartialEq)]
struct Sku {
    id: String,
    color: Option<String>,
    size: Option<String>,
}

impl Variant for Sku {
    fn variant_id(&self) -> &str {
        &self.id
    }

    fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }
}

/// Small deterministic generator so failures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, values: &[&'a str]) -> Option<&'a str> {
        // One slot in six is a missing attribute.
        let roll = self.next() as usize % (values.len() + 1);
        values.get(roll).copied()
    }
}

fn generate(seed: u64, len: usize) -> Vec<Sku> {
    let mut rng = Lcg(seed);
    (0..len)
        .map(|n| Sku {
            id: format!("v{}", n),
            color: rng.pick(&COLORS).map(str::to_string),
            size: rng.pick(&SIZES).map(str::to_string),
        })
        .collect()
}

fn has_attrs(sku: &Sku, color: &str, size: &str) -> bool {
    sku.color.as_deref() == Some(color) && sku.size.as_deref() == Some(size)
}

#[test]
fn test_index_agrees_with_linear_scan() {
    for seed in 1..=40u64 {
        let variants = generate(seed, (seed as usize * 3) % 37);
        let index = VariantIndex::build(variants.clone());

        for color in COLORS.iter().filter(|c| !c.is_empty()) {
            for size in SIZES.iter().filter(|s| !s.is_empty()) {
                let scanned = variants.iter().rev().find(|v| has_attrs(v, color, size));

                assert_eq!(
                    index.is_valid_combination(color, size),
                    scanned.is_some(),
                    "seed {} pair {}/{}",
                    seed,
                    color,
                    size
                );
                assert_eq!(
                    index.resolve(Some(*color), Some(*size)),
                    scanned,
                    "seed {} pair {}/{}",
                    seed,
                    color,
                    size
                );
            }
        }
    }
}

#[test]
fn test_attribute_groups_preserve_input_order() {
    for seed in [3u64, 17, 99] {
        let variants = generate(seed, 30);
        let index = VariantIndex::build(variants.clone());

        for color in COLORS.iter().filter(|c| !c.is_empty()) {
            let expected: Vec<&Sku> = variants
                .iter()
                .filter(|v| v.color.as_deref() == Some(*color))
                .collect();
            assert_eq!(index.variants_for_color(color), expected);
        }
        for size in SIZES.iter().filter(|s| !s.is_empty()) {
            let expected: Vec<&Sku> = variants
                .iter()
                .filter(|v| v.size.as_deref() == Some(*size))
                .collect();
            assert_eq!(index.variants_for_size(size), expected);
            assert_eq!(index.resolve(None, Some(*size)), expected.first().copied());
        }
    }
}

#[test]
fn test_distinct_values_are_sorted_and_skip_blanks() {
    let variants = generate(7, 50);
    let index = VariantIndex::build(variants.clone());

    let mut colors: Vec<&str> = variants
        .iter()
        .filter_map(|v| v.color.as_deref())
        .filter(|c| !c.is_empty())
        .collect();
    colors.sort_unstable();
    colors.dedup();

    assert_eq!(index.colors(), colors);
    assert!(!index.sizes().contains(&""));
    assert_eq!(index.len(), 50);
}

#[test]
fn test_incomplete_selection_resolves_to_nothing() {
    let index = VariantIndex::build(generate(11, 20));

    assert!(index.resolve(Some("Red"), None).is_none());
    assert!(index.resolve(None, None).is_none());
    assert!(!index.is_valid_combination("Purple", "M"));
}

#[test]
fn test_lazy_index_follows_replacement() {
    let first: Arc<[Sku]> = generate(5, 12).into();
    let mut indexed = IndexedVariants::new(Arc::clone(&first));
    assert!(!indexed.is_built());

    assert!(!indexed.index().is_empty());
    assert!(indexed.is_built());
    assert!(!indexed.replace(Arc::clone(&first)));
    assert!(indexed.is_built());

    let second: Arc<[Sku]> = vec![Sku {
        id: "only".to_string(),
        color: Some("Teal".to_string()),
        size: Some("XL".to_string()),
    }]
    .into();
    assert!(indexed.replace(second));
    assert!(!indexed.is_built());
    assert_eq!(indexed.index().colors(), vec!["Teal"]);
}
