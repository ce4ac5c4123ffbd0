// ============================================================================
// Cart
// ============================================================================

use super::models::CartItem;
use crate::core::{ApiError, Result, SyncError};
use crate::sync::{Mutation, ReadOptions, RemoteCollection, RemoteOperation};
use im::Vector;
use reqwest::Method;
use serde_json::json;
use std::future::Future;
use tracing::info;

pub(crate) fn cart_source(account_id: &str) -> String {
    crate::http::with_query("/carts", &[("acc_id", account_id)])
}

/// Cart of the signed-in account
#[derive(Clone)]
pub struct CartService {
    items: RemoteCollection<CartItem>,
    account_id: String,
}

impl CartService {
    pub fn new(items: RemoteCollection<CartItem>, account_id: impl Into<String>) -> Self {
        Self {
            items,
            account_id: account_id.into(),
        }
    }

    pub fn collection(&self) -> &RemoteCollection<CartItem> {
        &self.items
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Cached items within the freshness window unless `force`.
    pub async fn load(&self, force: bool) -> std::result::Result<Vector<CartItem>, ApiError> {
        let options = if force {
            ReadOptions::forced()
        } else {
            ReadOptions::cached()
        };
        self.items.read(options).await
    }

    pub fn items(&self) -> Vector<CartItem> {
        self.items.items()
    }

    /// Sum of unit price times quantity over every line
    pub fn total_price(&self) -> f64 {
        self.items.items().iter().map(CartItem::line_total).sum()
    }

    pub fn item_count(&self) -> usize {
        self.items.items().len()
    }

    /// Show `quantity` immediately; persist it after the debounce window.
    pub fn set_quantity(&self, item_id: &str, quantity: u32) -> Result<CartItem> {
        if quantity < 1 {
            return Err(SyncError::Validation("Quantity must be at least 1".to_string()));
        }

        let item = self.items.get(item_id).ok_or_else(|| {
            SyncError::EntityNotFound(self.items.key().to_string(), item_id.to_string())
        })?;
        let price = item
            .pro_price
            .ok_or_else(|| SyncError::Validation("Product price not available".to_string()))?;

        let operation = RemoteOperation::put(
            format!("/carts/{}", item_id),
            json!({ "pro_quantity": quantity, "pro_price": price }),
        )
        .on_success("Quantity updated successfully!");

        self.items
            .update_debounced(item_id, |line| line.pro_quantity = quantity, operation)
    }

    /// Remove a line. The item disappears before this returns; the future
    /// resolves once the server confirms or the removal is rolled back.
    pub fn remove(&self, item_id: &str) -> impl Future<Output = Result<()>> + Send + 'static {
        let handle = self.items.submit(Mutation::remove(
            item_id,
            RemoteOperation::delete(format!("/carts/{}", item_id)).on_success("Item removed from cart!"),
        ));
        async move {
            handle.await??;
            Ok(())
        }
    }

    /// Add a variant to the cart and mark the cached cart stale.
    pub async fn add_item(&self, variant_id: &str, quantity: u32, unit_price: f64) -> Result<()> {
        let body = json!({
            "acc_id": self.account_id,
            "variant_id": variant_id,
            "pro_quantity": quantity,
            "pro_price": unit_price,
        });

        let notifier = self.items.notifier();
        let result = self
            .items
            .client()
            .authorized_request(
                Method::POST,
                "/carts",
                Some(body),
                &[],
                Some(crate::http::RetryPolicy::no_retry()),
            )
            .await;

        match result {
            Ok(_) => {
                self.items.invalidate();
                info!(account = %self.account_id, variant = %variant_id, quantity, "added to cart");
                let plural = if quantity > 1 { "s" } else { "" };
                notifier.success(format!(
                    "{} item{} added to cart successfully!",
                    quantity, plural
                ));
                Ok(())
            }
            Err(err) => {
                notifier.error(err.to_string());
                Err(err.into())
            }
        }
    }
}
