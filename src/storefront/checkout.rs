// ============================================================================
// Checkout
// ============================================================================
//
// Places an order from the cart (or a single "buy now" line):
//   1. POST /orders with the shipping details and total
//   2. one POST /order-details per line, concurrently
//   3. cash: clear the purchased cart lines
//      online: request a payment URL and hand it back untouched
//
// The orders collection is marked stale either way so the next read
// shows the new order.
//
// ============================================================================

use super::cart::CartService;
use super::models::{CartItem, NO_FEEDBACK};
use super::orders::OrderService;
use crate::core::{Result, SyncError};
use crate::http::RetryPolicy;
use crate::sync::{Mutation, RemoteOperation};
use futures::future::join_all;
use reqwest::Method;
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

pub const EMPTY_CART_MESSAGE: &str = "Your cart is empty";
pub const MISSING_SHIPPING_MESSAGE: &str = "Please fill in all required fields";
pub const ORDER_PLACED_MESSAGE: &str = "Order placed successfully!";

/// Where the order goes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    pub username: String,
    pub address: String,
    pub phone: String,
}

impl ShippingDetails {
    pub fn new(username: &str, address: &str, phone: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            address: address.trim().to_string(),
            phone: phone.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.address.is_empty() && !self.phone.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    /// Pay on delivery
    #[default]
    Cash,
    /// Redirect to a payment gateway
    Online { bank_code: String, language: String },
}

impl PaymentMethod {
    pub fn online() -> Self {
        PaymentMethod::Online {
            bank_code: String::new(),
            language: "vn".to_string(),
        }
    }
}

/// One purchased line
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLine {
    pub variant_id: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl CheckoutLine {
    pub fn new(variant_id: impl Into<String>, unit_price: f64, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            unit_price,
            quantity,
        }
    }

    fn from_cart(item: &CartItem) -> Option<Self> {
        let variant_id = item.variant_id.as_ref()?.id().to_string();
        Some(Self::new(
            variant_id,
            item.pro_price.unwrap_or(0.0),
            item.pro_quantity.max(1),
        ))
    }

    pub fn total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Result of placing an order
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Cash order recorded; the cart has been cleared.
    Placed { order_id: String },
    /// Order recorded; payment continues at `payment_url`.
    AwaitingPayment { order_id: String, payment_url: String },
}

impl CheckoutOutcome {
    pub fn order_id(&self) -> &str {
        match self {
            CheckoutOutcome::Placed { order_id }
            | CheckoutOutcome::AwaitingPayment { order_id, .. } => order_id,
        }
    }
}

#[derive(Clone)]
pub struct CheckoutService {
    cart: CartService,
    orders: OrderService,
}

impl CheckoutService {
    pub fn new(cart: CartService, orders: OrderService) -> Self {
        Self { cart, orders }
    }

    /// Order total for the current cart
    pub fn cart_total(&self) -> f64 {
        self.cart.total_price()
    }

    /// Order everything in the cart.
    pub async fn place_order(
        &self,
        shipping: &ShippingDetails,
        payment: &PaymentMethod,
    ) -> Result<CheckoutOutcome> {
        self.cart.load(false).await?;
        let items = self.cart.items();
        let lines: Vec<CheckoutLine> = items.iter().filter_map(CheckoutLine::from_cart).collect();
        if lines.len() != items.len() {
            warn!(
                account = %self.cart.account_id(),
                skipped = items.len() - lines.len(),
                "cart lines without a variant left out of the order"
            );
        }
        let cart_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        self.place(lines, shipping, payment, &cart_ids).await
    }

    /// Order a single line without touching the cart.
    pub async fn buy_now(
        &self,
        line: CheckoutLine,
        shipping: &ShippingDetails,
        payment: &PaymentMethod,
    ) -> Result<CheckoutOutcome> {
        self.place(vec![line], shipping, payment, &[]).await
    }

    async fn place(
        &self,
        lines: Vec<CheckoutLine>,
        shipping: &ShippingDetails,
        payment: &PaymentMethod,
        cart_ids: &[String],
    ) -> Result<CheckoutOutcome> {
        let notifier = self.cart.collection().notifier().clone();
        let result = self.submit(lines, shipping, payment, cart_ids).await;
        match &result {
            Ok(CheckoutOutcome::Placed { .. }) => {
                notifier.success(ORDER_PLACED_MESSAGE);
            }
            Ok(CheckoutOutcome::AwaitingPayment { .. }) => {}
            Err(err) => {
                let message = match err {
                    SyncError::Validation(message) => message.clone(),
                    other => other.to_string(),
                };
                notifier.error(message);
            }
        }
        result
    }

    async fn submit(
        &self,
        lines: Vec<CheckoutLine>,
        shipping: &ShippingDetails,
        payment: &PaymentMethod,
        cart_ids: &[String],
    ) -> Result<CheckoutOutcome> {
        if lines.is_empty() {
            return Err(SyncError::Validation(EMPTY_CART_MESSAGE.to_string()));
        }
        if !shipping.is_complete() {
            return Err(SyncError::Validation(MISSING_SHIPPING_MESSAGE.to_string()));
        }

        let client = self.cart.collection().client();
        let total: f64 = lines.iter().map(CheckoutLine::total).sum();
        let order = json!({
            "acc_id": self.cart.account_id(),
            "username": shipping.username,
            "addressReceive": shipping.address,
            "phone": shipping.phone,
            "totalPrice": total,
            "order_status": "pending",
            "pay_status": "unpaid",
            "shipping_status": "not_shipped",
            "feedback_order": NO_FEEDBACK,
        });
        let response = client
            .authorized_request(Method::POST, "/orders", Some(order), &[], Some(RetryPolicy::no_retry()))
            .await?;
        let order_id = created_order_id(&response)?;
        self.orders.collection().invalidate();

        let details = lines.iter().map(|line| {
            let body = json!({
                "order_id": order_id,
                "variant_id": line.variant_id,
                "UnitPrice": line.unit_price,
                "Quantity": line.quantity,
                "feedback_details": NO_FEEDBACK,
            });
            client.authorized_request(
                Method::POST,
                "/order-details",
                Some(body),
                &[],
                Some(RetryPolicy::no_retry()),
            )
        });
        if let Some(err) = join_all(details).await.into_iter().find_map(|r| r.err()) {
            warn!(order = %order_id, error = %err, "order lines could not be recorded");
            return Err(err.into());
        }
        info!(order = %order_id, lines = lines.len(), total, "order placed");

        match payment {
            PaymentMethod::Cash => {
                self.clear_cart(cart_ids).await?;
                Ok(CheckoutOutcome::Placed { order_id })
            }
            PaymentMethod::Online {
                bank_code,
                language,
            } => {
                let body = json!({
                    "orderId": order_id,
                    "bankCode": bank_code,
                    "language": language,
                });
                let response = client
                    .authorized_request(
                        Method::POST,
                        "/orders/payment-url",
                        Some(body),
                        &[],
                        Some(RetryPolicy::no_retry()),
                    )
                    .await?;
                let payment_url = response
                    .get("paymentUrl")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| {
                        SyncError::Serialization("payment response has no paymentUrl".to_string())
                    })?
                    .to_string();
                Ok(CheckoutOutcome::AwaitingPayment {
                    order_id,
                    payment_url,
                })
            }
        }
    }

    /// Remove purchased lines through the cart collection so each removal
    /// shows at once and rolls back on its own failure.
    async fn clear_cart(&self, cart_ids: &[String]) -> Result<()> {
        let items = self.cart.collection();
        let removals = cart_ids.iter().map(|id| {
            items.mutate(Mutation::remove(
                id.as_str(),
                RemoteOperation::delete(format!("/carts/{}", id)),
            ))
        });
        for result in join_all(removals).await {
            result?;
        }
        Ok(())
    }
}

fn created_order_id(response: &JsonValue) -> Result<String> {
    response
        .get("order")
        .unwrap_or(response)
        .get("_id")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| SyncError::Serialization("order response has no _id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_details_are_trimmed() {
        let shipping = ShippingDetails::new(" ann ", "  ", "0901234567");
        assert_eq!(shipping.username, "ann");
        assert!(!shipping.is_complete());
        assert!(ShippingDetails::new("ann", "12 Hang Bac", "0901").is_complete());
    }

    #[test]
    fn test_order_id_accepts_wrapped_or_bare() {
        assert_eq!(
            created_order_id(&json!({"order": {"_id": "o1"}})).unwrap(),
            "o1"
        );
        assert_eq!(created_order_id(&json!({"_id": "o2"})).unwrap(), "o2");
        assert!(created_order_id(&json!({"ok": true})).is_err());
    }

    #[test]
    fn test_line_total() {
        assert_eq!(CheckoutLine::new("v1", 250.0, 3).total(), 750.0);
    }
}
