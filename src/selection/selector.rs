use super::index::{Variant, VariantIndex};
use crate::core::{Result, SyncError};
use serde::{Deserialize, Serialize};

pub const MAX_QUANTITY: u32 = 99;
pub const SELECT_VARIANT_MESSAGE: &str = "Please select a valid color and size combination";
pub const OUT_OF_STOCK_MESSAGE: &str = "Product is out of stock";

/// Current color / size / quantity choice on a product page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    pub color: Option<String>,
    pub size: Option<String>,
    pub variant_id: Option<String>,
    pub quantity: u32,
}

impl VariantSelection {
    pub fn new() -> Self {
        Self {
            color: None,
            size: None,
            variant_id: None,
            quantity: 1,
        }
    }

    /// Choosing a color clears the size and the resolved variant.
    pub fn select_color(&mut self, color: &str) {
        if color.is_empty() {
            return;
        }
        self.color = Some(color.to_string());
        self.size = None;
        self.variant_id = None;
    }

    /// Choose a size and resolve the variant against `index`.
    pub fn select_size<'a, V: Variant>(
        &mut self,
        index: &'a VariantIndex<V>,
        size: &str,
    ) -> Option<&'a V> {
        if size.is_empty() {
            return None;
        }
        self.size = Some(size.to_string());
        let resolved = index.resolve(self.color.as_deref(), Some(size));
        self.variant_id = resolved.map(|v| v.variant_id().to_string());
        resolved
    }

    pub fn selected_variant<'a, V: Variant>(&self, index: &'a VariantIndex<V>) -> Option<&'a V> {
        self.variant_id.as_deref().and_then(|id| index.find(id))
    }

    /// Largest quantity allowed for `stock`. Unknown or zero stock caps at 99.
    pub fn max_quantity(stock: Option<u32>) -> u32 {
        match stock {
            Some(stock) if stock > 0 => stock.min(MAX_QUANTITY),
            _ => MAX_QUANTITY,
        }
    }

    /// Store `requested` clamped to the allowed range.
    ///
    /// Returns a message when the value had to be adjusted.
    pub fn set_quantity(&mut self, requested: i64, stock: Option<u32>) -> Option<String> {
        if requested < 1 {
            self.quantity = 1;
            return Some("Quantity must be at least 1".to_string());
        }

        let max = Self::max_quantity(stock);
        if requested > i64::from(max) {
            self.quantity = max;
            return Some(format!("Quantity cannot exceed {}", max));
        }

        self.quantity = requested as u32;
        None
    }

    /// Check the selection can be bought; returns the chosen variant.
    pub fn validate_for_purchase<'a, V: Variant>(
        &self,
        index: &'a VariantIndex<V>,
        in_stock: bool,
    ) -> Result<&'a V> {
        let variant = self
            .selected_variant(index)
            .ok_or_else(|| SyncError::Validation(SELECT_VARIANT_MESSAGE.to_string()))?;

        if !in_stock {
            return Err(SyncError::Validation(OUT_OF_STOCK_MESSAGE.to_string()));
        }

        if let Some(stock) = variant.stock().filter(|&s| s > 0) {
            if self.quantity > stock {
                return Err(SyncError::Validation(format!(
                    "Only {} items available in stock",
                    stock
                )));
            }
        }

        Ok(variant)
    }
}

impl Default for VariantSelection {
    fn default() -> Self {
        Self::new()
    }
}
