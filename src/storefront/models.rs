// ============================================================================
// Storefront Models
// ============================================================================
//
// Field names follow the backend's JSON. Fields this crate does not use are
// kept in `extra` so documents survive a round trip unchanged.
//
// ============================================================================

use crate::core::SyncEntity;
use crate::selection::Variant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Sentinel the backend stores for "no feedback"
pub const NO_FEEDBACK: &str = "None";

/// A reference that may arrive as a bare id or as the populated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Doc(Box<T>),
}

impl<T: SyncEntity> Ref<T> {
    pub fn id(&self) -> &str {
        match self {
            Ref::Id(id) => id,
            Ref::Doc(doc) => doc.entity_id(),
        }
    }

    pub fn doc(&self) -> Option<&T> {
        match self {
            Ref::Id(_) => None,
            Ref::Doc(doc) => Some(&**doc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub cat_name: Option<String>,
}

impl SyncEntity for Category {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub pro_name: Option<String>,
    #[serde(default)]
    pub pro_price: Option<f64>,
    #[serde(default)]
    pub status_product: Option<String>,
    #[serde(rename = "imageURL", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cat_id: Option<Ref<Category>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status_product.as_deref() == Some("active")
    }

    pub fn category_name(&self) -> Option<&str> {
        self.cat_id
            .as_ref()
            .and_then(Ref::doc)
            .and_then(|c| c.cat_name.as_deref())
    }

    pub fn display_name(&self) -> &str {
        self.pro_name.as_deref().unwrap_or("Unnamed Product")
    }
}

impl SyncEntity for Product {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRef {
    #[serde(default)]
    pub color_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRef {
    #[serde(default)]
    pub size_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub pro_id: Option<Ref<Product>>,
    #[serde(default)]
    pub color_id: Option<ColorRef>,
    #[serde(default)]
    pub size_id: Option<SizeRef>,
    /// Units in stock
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ProductVariant {
    pub fn product_id(&self) -> Option<&str> {
        self.pro_id.as_ref().map(Ref::id)
    }
}

impl Variant for ProductVariant {
    fn variant_id(&self) -> &str {
        &self.id
    }

    fn color(&self) -> Option<&str> {
        self.color_id.as_ref().and_then(|c| c.color_name.as_deref())
    }

    fn size(&self) -> Option<&str> {
        self.size_id.as_ref().and_then(|s| s.size_name.as_deref())
    }

    fn stock(&self) -> Option<u32> {
        self.quantity
    }
}

impl SyncEntity for ProductVariant {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub variant_id: Option<Ref<ProductVariant>>,
    #[serde(default)]
    pub pro_quantity: u32,
    #[serde(default)]
    pub pro_price: Option<f64>,
    #[serde(rename = "Total_price", default)]
    pub total_price: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl CartItem {
    /// Unit price times quantity
    pub fn line_total(&self) -> f64 {
        self.pro_price.unwrap_or(0.0) * f64::from(self.pro_quantity)
    }

    pub fn variant(&self) -> Option<&ProductVariant> {
        self.variant_id.as_ref().and_then(Ref::doc)
    }
}

impl SyncEntity for CartItem {
    fn entity_id(&self) -> &str {
        &self.id
    }

    /// Accepts `{cartItem: {...}}` or the bare item.
    fn reconcile(&mut self, response: &JsonValue) {
        let fields = response.get("cartItem").unwrap_or(response);
        if let Some(price) = fields.get("pro_price").and_then(JsonValue::as_f64) {
            self.pro_price = Some(price);
        }
        if let Some(total) = fields.get("Total_price").and_then(JsonValue::as_f64) {
            self.total_price = Some(total);
        }
        if let Some(quantity) = fields
            .get("pro_quantity")
            .and_then(JsonValue::as_u64)
            .and_then(|q| u32::try_from(q).ok())
        {
            self.pro_quantity = quantity;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub pay_status: Option<String>,
    #[serde(default)]
    pub shipping_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Order {
    /// Delivered, paid and shipped orders accept feedback.
    pub fn can_provide_feedback(&self) -> bool {
        self.order_status.as_deref() == Some("delivered")
            && self.pay_status.as_deref() == Some("paid")
            && self.shipping_status.as_deref() == Some("delivered")
    }

    /// Pending or confirmed orders that have not shipped may be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self.order_status.as_deref(), Some("pending" | "confirmed"))
            && self.shipping_status.as_deref() == Some("not_shipped")
    }
}

impl SyncEntity for Order {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, response: &JsonValue) {
        let fields = response.get("order").unwrap_or(response);
        for (field, slot) in [
            ("order_status", &mut self.order_status),
            ("pay_status", &mut self.pay_status),
            ("shipping_status", &mut self.shipping_status),
        ] {
            if let Some(value) = fields.get(field).and_then(JsonValue::as_str) {
                *slot = Some(value.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub variant_id: Option<Ref<ProductVariant>>,
    #[serde(default)]
    pub feedback_details: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl OrderDetail {
    /// Feedback text, if any was left
    pub fn feedback(&self) -> Option<&str> {
        self.feedback_details
            .as_deref()
            .filter(|text| !text.is_empty() && *text != NO_FEEDBACK)
    }

    pub fn product_name(&self) -> Option<&str> {
        self.variant_id
            .as_ref()
            .and_then(Ref::doc)
            .and_then(|variant| variant.pro_id.as_ref())
            .and_then(Ref::doc)
            .and_then(|product| product.pro_name.as_deref())
    }
}

impl SyncEntity for OrderDetail {
    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Id given to a favorite before the server assigns one
pub(crate) fn provisional_favorite_id(product_id: &str) -> String {
    format!("pending:{}", product_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub pro_id: Option<Ref<Product>>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Favorite {
    pub(crate) fn provisional(product_id: &str) -> Self {
        Self {
            id: provisional_favorite_id(product_id),
            pro_id: Some(Ref::Id(product_id.to_string())),
            extra: Map::new(),
        }
    }

    pub fn product_id(&self) -> Option<&str> {
        self.pro_id.as_ref().map(Ref::id)
    }

    /// Not yet confirmed by the server
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with("pending:")
    }
}

impl SyncEntity for Favorite {
    fn entity_id(&self) -> &str {
        &self.id
    }

    /// Adopt the server id from `{favorite: {_id}}`.
    fn reconcile(&mut self, response: &JsonValue) {
        let fields = response.get("favorite").unwrap_or(response);
        if let Some(id) = fields.get("_id").and_then(JsonValue::as_str) {
            self.id = id.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ref_accepts_id_or_document() {
        let by_id: ProductVariant =
            serde_json::from_value(json!({"_id": "v1", "pro_id": "p1"})).unwrap();
        assert_eq!(by_id.product_id(), Some("p1"));

        let populated: ProductVariant = serde_json::from_value(json!({
            "_id": "v2",
            "pro_id": {"_id": "p2", "pro_name": "Tee"},
            "color_id": {"color_name": "Red"},
            "size_id": {"size_name": "M"},
            "quantity": 4
        }))
        .unwrap();
        assert_eq!(populated.product_id(), Some("p2"));
        assert_eq!(populated.color(), Some("Red"));
        assert_eq!(populated.stock(), Some(4));
    }

    #[test]
    fn test_unknown_fields_survive() {
        let raw = json!({"_id": "c1", "pro_quantity": 2, "acc_id": "u1"});
        let item: CartItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.extra.get("acc_id"), Some(&json!("u1")));
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["acc_id"], json!("u1"));
    }

    #[test]
    fn test_cart_item_reconciles_server_totals() {
        let mut item: CartItem =
            serde_json::from_value(json!({"_id": "a", "pro_quantity": 3, "pro_price": 1000.0})).unwrap();
        item.reconcile(&json!({"cartItem": {"pro_price": 1000, "Total_price": 3000}}));
        assert_eq!(item.total_price, Some(3000.0));
        assert_eq!(item.line_total(), 3000.0);
    }

    #[test]
    fn test_order_rules() {
        let order: Order = serde_json::from_value(json!({
            "_id": "o1",
            "order_status": "delivered",
            "pay_status": "paid",
            "shipping_status": "delivered"
        }))
        .unwrap();
        assert!(order.can_provide_feedback());
        assert!(!order.can_cancel());

        let pending: Order = serde_json::from_value(json!({
            "_id": "o2",
            "order_status": "pending",
            "shipping_status": "not_shipped"
        }))
        .unwrap();
        assert!(pending.can_cancel());
        assert!(!pending.can_provide_feedback());
    }

    #[test]
    fn test_feedback_sentinel() {
        let detail: OrderDetail =
            serde_json::from_value(json!({"_id": "d1", "feedback_details": "None"})).unwrap();
        assert_eq!(detail.feedback(), None);
    }

    #[test]
    fn test_favorite_adopts_server_id() {
        let mut favorite = Favorite::provisional("p1");
        assert!(favorite.is_provisional());
        favorite.reconcile(&json!({"favorite": {"_id": "f9"}}));
        assert_eq!(favorite.id, "f9");
        assert!(!favorite.is_provisional());
    }
}
