// ============================================================================
// Orders
// ============================================================================

use super::models::{NO_FEEDBACK, Order, OrderDetail};
use crate::cache::ResponseCache;
use crate::core::{ApiError, Result, SyncError};
use crate::http::with_query;
use crate::sync::collection::decode_items;
use crate::sync::{Mutation, ReadOptions, RemoteCollection, RemoteOperation};
use futures::future::join_all;
use im::Vector;
use reqwest::Method;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const FEEDBACK_SAVED: &str = "Feedback submitted successfully!";
const FEEDBACK_DELETED: &str = "Feedback deleted successfully!";

fn non_empty_feedback(feedback: &str) -> Result<&str> {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        return Err(SyncError::Validation("Feedback cannot be empty".to_string()));
    }
    Ok(feedback)
}

pub(crate) fn orders_source(account_id: &str) -> String {
    with_query("/orders", &[("acc_id", account_id)])
}

/// Fields echoed back when an order is updated
const ORDER_ECHO_FIELDS: [&str; 5] = [
    "addressReceive",
    "phone",
    "totalPrice",
    "pay_status",
    "shipping_status",
];

#[derive(Clone)]
pub struct OrderService {
    orders: RemoteCollection<Order>,
    details: Arc<ResponseCache<Vec<OrderDetail>>>,
    account_id: String,
}

impl OrderService {
    pub fn new(
        orders: RemoteCollection<Order>,
        details: Arc<ResponseCache<Vec<OrderDetail>>>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            details,
            account_id: account_id.into(),
        }
    }

    pub fn collection(&self) -> &RemoteCollection<Order> {
        &self.orders
    }

    pub async fn load(&self, force: bool) -> std::result::Result<Vector<Order>, ApiError> {
        let options = if force {
            ReadOptions::forced()
        } else {
            ReadOptions::cached()
        };
        self.orders.read(options).await
    }

    /// Server-side search. Results are not cached; a blank query lists
    /// the account's orders instead.
    pub async fn search(&self, query: &str) -> std::result::Result<Vec<Order>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(self.load(false).await?.into_iter().collect());
        }

        let path = with_query(
            "/orders/search",
            &[("acc_id", self.account_id.as_str()), ("q", query)],
        );
        let body = self
            .orders
            .client()
            .authorized_request(Method::GET, &path, None, &[], None)
            .await?;
        Ok(decode_items::<Order>("orders:search", body).into_iter().collect())
    }

    pub fn can_provide_feedback(&self, order_id: &str) -> bool {
        self.orders
            .get(order_id)
            .is_some_and(|order| order.can_provide_feedback())
    }

    // ========================================================================
    // Details
    // ========================================================================

    /// Line items of an order, cached per order id.
    pub async fn details(
        &self,
        order_id: &str,
        force: bool,
    ) -> std::result::Result<Vec<OrderDetail>, ApiError> {
        if !force {
            if let Some(cached) = self.details.get_fresh(order_id) {
                return Ok(cached);
            }
        }

        let path = with_query("/order-details", &[("order_id", order_id)]);
        let body = self
            .orders
            .client()
            .authorized_request(Method::GET, &path, None, &[], None)
            .await?;
        let details: Vec<OrderDetail> = decode_items("order-details", body).into_iter().collect();
        self.details.insert(order_id, details.clone());
        Ok(details)
    }

    /// Fetch details for many orders at once. Failures yield an empty list.
    pub async fn prefetch_details(&self, order_ids: &[String]) -> HashMap<String, Vec<OrderDetail>> {
        let fetches = order_ids.iter().map(|order_id| async move {
            let details = match self.details(order_id, false).await {
                Ok(details) => details,
                Err(err) => {
                    warn!(order = %order_id, error = %err, "order details unavailable");
                    Vec::new()
                }
            };
            (order_id.clone(), details)
        });
        join_all(fetches).await.into_iter().collect()
    }

    pub fn cached_details(&self, order_id: &str) -> Option<Vec<OrderDetail>> {
        self.details.get(order_id).map(|entry| entry.value)
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    /// Attach `feedback` to every line of the order.
    pub async fn submit_feedback(&self, order_id: &str, feedback: &str) -> Result<()> {
        let feedback = non_empty_feedback(feedback)?;
        self.set_feedback(order_id, None, feedback, FEEDBACK_SAVED).await
    }

    pub async fn delete_feedback(&self, order_id: &str) -> Result<()> {
        self.set_feedback(order_id, None, NO_FEEDBACK, FEEDBACK_DELETED)
            .await
    }

    /// Attach `feedback` to one line of the order.
    pub async fn submit_line_feedback(
        &self,
        order_id: &str,
        detail_id: &str,
        feedback: &str,
    ) -> Result<()> {
        let feedback = non_empty_feedback(feedback)?;
        self.set_feedback(order_id, Some(detail_id), feedback, FEEDBACK_SAVED)
            .await
    }

    pub async fn delete_line_feedback(&self, order_id: &str, detail_id: &str) -> Result<()> {
        self.set_feedback(order_id, Some(detail_id), NO_FEEDBACK, FEEDBACK_DELETED)
            .await
    }

    /// Write `feedback` to the order's lines (or only `line`), optimistically
    /// in the details cache.
    async fn set_feedback(
        &self,
        order_id: &str,
        line: Option<&str>,
        feedback: &str,
        success: &str,
    ) -> Result<()> {
        if let Some(order) = self.orders.get(order_id) {
            if !order.can_provide_feedback() {
                return Err(SyncError::Validation(
                    "Feedback is only available for delivered and paid orders".to_string(),
                ));
            }
        }

        let details = self.details(order_id, false).await?;
        if details.is_empty() {
            return Err(SyncError::Validation("Order has no items".to_string()));
        }
        let targeted = |detail: &OrderDetail| line.is_none_or(|id| detail.id == id);
        let targets: Vec<&OrderDetail> = details.iter().filter(|d| targeted(d)).collect();
        if let (Some(id), true) = (line, targets.is_empty()) {
            return Err(SyncError::EntityNotFound(
                format!("order-details:{}", order_id),
                id.to_string(),
            ));
        }

        let previous = self.details.update(order_id, |lines| {
            for detail in lines.iter_mut().filter(|d| targeted(d)) {
                detail.feedback_details = Some(feedback.to_string());
            }
        });

        let client = self.orders.client();
        let updates = targets.iter().map(|detail| {
            let path = format!("/order-details/{}", detail.id);
            let body = json!({ "feedback_details": feedback });
            async move {
                client
                    .authorized_request(Method::PUT, &path, Some(body), &[], None)
                    .await
            }
        });
        let results = join_all(updates).await;

        let notifier = self.orders.notifier();
        match results.into_iter().find_map(|result| result.err()) {
            None => {
                debug!(order = %order_id, lines = targets.len(), "feedback saved");
                notifier.success(success);
                Ok(())
            }
            Some(err) => {
                if let Some(previous) = previous {
                    self.details.restore(order_id, previous);
                }
                warn!(order = %order_id, error = %err, "feedback update rolled back");
                notifier.error(err.to_string());
                Err(err.into())
            }
        }
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Optimistically mark the order cancelled.
    pub async fn cancel_order(&self, order_id: &str) -> Result<Option<Order>> {
        let order = self.orders.get(order_id).ok_or_else(|| {
            SyncError::EntityNotFound(self.orders.key().to_string(), order_id.to_string())
        })?;
        if !order.can_cancel() {
            return Err(SyncError::Validation(
                "This order can no longer be cancelled".to_string(),
            ));
        }

        let operation = RemoteOperation::put(
            format!("/orders/{}", order_id),
            JsonValue::Object(cancel_payload(&order)),
        )
        .on_success("Order cancelled successfully!");

        self.orders
            .mutate(Mutation::update(
                order_id,
                |order: &mut Order| order.order_status = Some("cancelled".to_string()),
                operation,
            ))
            .await
    }
}

fn cancel_payload(order: &Order) -> Map<String, JsonValue> {
    let mut payload = Map::new();
    let account = order.extra.get("acc_id").map(|acc| match acc.get("_id") {
        Some(id) => id.clone(),
        None => acc.clone(),
    });
    if let Some(account) = account {
        payload.insert("acc_id".to_string(), account);
    }

    for field in ORDER_ECHO_FIELDS {
        let value = match field {
            "pay_status" => order.pay_status.clone().map(JsonValue::String),
            "shipping_status" => order.shipping_status.clone().map(JsonValue::String),
            _ => order.extra.get(field).cloned(),
        };
        if let Some(value) = value {
            payload.insert(field.to_string(), value);
        }
    }
    if let Some(feedback) = order.extra.get("feedback_order") {
        payload.insert("feedback_order".to_string(), feedback.clone());
    }
    payload.insert("order_status".to_string(), json!("cancelled"));
    payload
}
