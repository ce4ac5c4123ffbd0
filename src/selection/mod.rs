// ============================================================================
// Derived Selection
// ============================================================================

pub mod index;
pub mod selector;

pub use index::{IndexedVariants, Variant, VariantIndex};
pub use selector::VariantSelection;
