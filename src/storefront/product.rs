// ============================================================================
// Product Detail
// ============================================================================
//
// One product page: the product, its variants indexed by color and size,
// the shopper's current selection, and add-to-cart.
//
// ============================================================================

use super::cart::CartService;
use super::models::{Product, ProductVariant};
use super::preferences::{Preferences, StoredSelection};
use crate::core::{ApiError, Result, SyncError};
use crate::http::{ApiClient, with_query};
use crate::selection::{IndexedVariants, Variant, VariantIndex, VariantSelection};
use crate::sync::collection::decode_items;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::warn;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder-image.png";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "imageURL")]
    pub image_url: String,
}

pub struct ProductDetail {
    product: Product,
    variants: IndexedVariants<ProductVariant>,
    images: Vec<ProductImage>,
    selection: VariantSelection,
    preferences: Option<Preferences>,
}

impl ProductDetail {
    /// Fetch the product and its variants concurrently. Images are optional
    /// and never fail the load.
    pub async fn load(client: &ApiClient, product_id: &str) -> Result<Self> {
        let product_path = format!("/products/{}", product_id);
        let variants_path = with_query("/variants", &[("pro_id", product_id)]);
        let (product, variants) = tokio::try_join!(
            client.request(Method::GET, &product_path, None, &[], None),
            client.request(Method::GET, &variants_path, None, &[], None),
        )?;

        if product.is_null() {
            return Err(ApiError::NotFound.into());
        }
        let product: Product = serde_json::from_value(product)?;
        let variants: Vec<ProductVariant> =
            decode_items("variants", variants).into_iter().collect();

        let images_path = format!("/specifications/image/product/{}", product_id);
        let images = match client.request(Method::GET, &images_path, None, &[], None).await {
            Ok(JsonValue::Array(raw)) => raw
                .into_iter()
                .filter_map(|image| serde_json::from_value(image).ok())
                .collect(),
            Ok(_) => Vec::new(),
            Err(err) => {
                warn!(product = %product_id, error = %err, "product images unavailable");
                Vec::new()
            }
        };

        Ok(Self::new(product, variants, images))
    }

    pub fn new(product: Product, variants: Vec<ProductVariant>, images: Vec<ProductImage>) -> Self {
        Self {
            product,
            variants: IndexedVariants::new(variants),
            images,
            selection: VariantSelection::new(),
            preferences: None,
        }
    }

    /// Persist every selection change through `preferences`.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn index(&self) -> &VariantIndex<ProductVariant> {
        self.variants.index()
    }

    pub fn replace_variants(&mut self, variants: Vec<ProductVariant>) {
        if self.variants.replace(Arc::from(variants)) {
            self.selection = VariantSelection::new();
        }
    }

    pub fn images(&self) -> &[ProductImage] {
        &self.images
    }

    /// Main image first, then the additional images.
    pub fn thumbnails(&self) -> Vec<&str> {
        self.product
            .image_url
            .as_deref()
            .into_iter()
            .chain(self.images.iter().map(|image| image.image_url.as_str()))
            .collect()
    }

    pub fn main_image(&self) -> &str {
        self.product.image_url.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }

    pub fn available_colors(&self) -> Vec<&str> {
        self.index().colors()
    }

    pub fn available_sizes(&self) -> Vec<&str> {
        self.index().sizes()
    }

    pub fn is_in_stock(&self) -> bool {
        self.product.is_active()
    }

    pub fn is_valid_combination(&self, color: &str, size: &str) -> bool {
        self.index().is_valid_combination(color, size)
    }

    pub fn selection(&self) -> &VariantSelection {
        &self.selection
    }

    pub fn selected_variant(&self) -> Option<&ProductVariant> {
        self.selection.selected_variant(self.variants.index())
    }

    pub fn stored_selection(&self) -> Option<StoredSelection> {
        self.preferences
            .as_ref()
            .and_then(|prefs| prefs.selection_for(&self.product.id))
    }

    pub fn select_color(&mut self, color: &str) {
        self.selection.select_color(color);
        self.remember();
    }

    pub fn select_size(&mut self, size: &str) -> Option<&ProductVariant> {
        self.selection.select_size(self.variants.index(), size);
        self.remember();
        self.selected_variant()
    }

    /// Returns a message when the quantity had to be clamped.
    pub fn set_quantity(&mut self, requested: i64) -> Option<String> {
        let stock = self.selected_variant().and_then(Variant::stock);
        let message = self.selection.set_quantity(requested, stock);
        self.remember();
        message
    }

    /// Validate the selection and add it to `cart`.
    ///
    /// Without a session this fails with `Unauthorized` and signals that a
    /// login is required.
    pub async fn add_to_cart(&self, cart: &CartService) -> Result<()> {
        cart.collection().client().session().require_token()?;

        let variant = self
            .selection
            .validate_for_purchase(self.variants.index(), self.is_in_stock())?;
        let price = self
            .product
            .pro_price
            .ok_or_else(|| SyncError::Validation("Product price not available".to_string()))?;

        cart.add_item(&variant.id, self.selection.quantity, price).await
    }

    fn remember(&self) {
        if let Some(prefs) = &self.preferences {
            if let Err(err) = prefs.remember_selection(&self.product.id, &self.selection) {
                warn!(product = %self.product.id, error = %err, "could not store selection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn detail() -> ProductDetail {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "pro_name": "Tee",
            "pro_price": 150.0,
            "status_product": "active",
            "imageURL": "/tee.png"
        }))
        .unwrap();
        let variants: Vec<ProductVariant> = serde_json::from_value(json!([
            {"_id": "v1", "color_id": {"color_name": "Red"}, "size_id": {"size_name": "M"}, "quantity": 3},
            {"_id": "v2", "color_id": {"color_name": "Blue"}, "size_id": {"size_name": "L"}, "quantity": 10}
        ]))
        .unwrap();
        let images = vec![ProductImage {
            id: Some("i1".into()),
            image_url: "/tee-back.png".into(),
        }];
        ProductDetail::new(product, variants, images)
    }

    #[test]
    fn test_selection_flow() {
        let mut detail = detail();
        detail.select_color("Red");
        assert!(!detail.is_valid_combination("Red", "L"));
        assert_eq!(detail.select_size("M").map(|v| v.id.as_str()), Some("v1"));

        assert_eq!(detail.set_quantity(5).as_deref(), Some("Quantity cannot exceed 3"));
        assert_eq!(detail.selection().quantity, 3);
    }

    #[test]
    fn test_thumbnails() {
        let detail = detail();
        assert_eq!(detail.thumbnails(), vec!["/tee.png", "/tee-back.png"]);
        assert_eq!(detail.main_image(), "/tee.png");
    }

    #[test]
    fn test_selection_is_persisted() {
        let prefs = Preferences::new(Arc::new(MemoryStore::new()));
        let mut detail = detail().with_preferences(prefs.clone());
        detail.select_color("Blue");
        detail.select_size("L");

        let stored = prefs.selection_for("p1").unwrap();
        assert_eq!(stored.selected_color.as_deref(), Some("Blue"));
        assert_eq!(stored.selected_size.as_deref(), Some("L"));
        assert_eq!(stored.quantity, Some(1));
    }

    #[test]
    fn test_new_variants_reset_selection() {
        let mut detail = detail();
        detail.select_color("Red");
        detail.select_size("M");
        detail.replace_variants(Vec::new());
        assert!(detail.selected_variant().is_none());
        assert!(detail.available_colors().is_empty());
    }
}
