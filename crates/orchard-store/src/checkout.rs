//! # Checkout Service
//!
//! Order materialization: the one operation that turns a cart into an
//! immutable order.
//!
//! ## Flow
//! ```text
//! place_order(customer, addresses, idempotency key)
//!        │
//!        ├── replay? key already has an order ──► return it unchanged
//!        │
//!        ├── load cart + items (empty ──► EMPTY_CART)
//!        ├── re-evaluate the applied coupon against the final subtotal
//!        ├── compute authoritative totals
//!        │
//!        ▼
//! OrderRepository::place  ── one transaction ──  order + N items
//!                                                + stock decrements
//!                                                + cart clear (CAS)
//! ```
//! Everything after the totals computation is atomic in `orchard-db`: a
//! short-stocked line or a cart that moved mid-checkout aborts the whole
//! materialization with nothing to clean up.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use orchard_core::{
    compute_totals, coupon::discount_for, validation, Address, CartLineItem, CheckoutPolicy,
    CoreError, Money, Order, OrderLineItem, OrderStatus,
};
use orchard_db::Database;

use crate::error::StoreError;

/// What the storefront submits at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Address,

    /// Defaults to the shipping address when absent.
    pub billing_address: Option<Address>,

    /// Client-generated key making retries safe. Submitting the same key
    /// twice returns the first order instead of creating a second one.
    pub idempotency_key: Option<String>,
}

/// A placed order with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// Checkout and order-history operations.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    db: Database,
    policy: CheckoutPolicy,
}

impl CheckoutService {
    pub fn new(db: Database, policy: CheckoutPolicy) -> Self {
        CheckoutService { db, policy }
    }

    /// Materializes the customer's cart into an order.
    ///
    /// Totals are recomputed server-side from the line items at this moment;
    /// whatever the cart row carried is not trusted. An applied coupon is
    /// re-evaluated against the final subtotal and fails checkout with its
    /// own error code if it no longer applies.
    pub async fn place_order(
        &self,
        customer_id: &str,
        request: CheckoutRequest,
    ) -> Result<OrderReceipt, StoreError> {
        debug!(customer_id = %customer_id, "place_order");

        validation::validate_customer_id(customer_id)?;

        let idempotency_key = request
            .idempotency_key
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Replay of an already-completed checkout
        if let Some(existing) = self
            .db
            .orders()
            .find_by_idempotency_key(&idempotency_key)
            .await?
        {
            if existing.customer_id != customer_id {
                return Err(StoreError::validation("Idempotency key already in use"));
            }
            info!(order_id = %existing.id, "Checkout replayed, returning existing order");
            let items = self.db.orders().items(&existing.id).await?;
            return Ok(OrderReceipt {
                order: existing,
                items,
            });
        }

        let cart = self
            .db
            .carts()
            .get_by_customer(customer_id)
            .await?
            .ok_or(CoreError::EmptyCart)?;
        let items = self.db.carts().items(&cart.id).await?;
        if items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let subtotal: Money = items.iter().map(CartLineItem::line_total).sum();
        let (discount, coupon_code) = match cart.coupon_code.as_deref() {
            Some(code) => {
                let coupon = self
                    .db
                    .coupons()
                    .find_by_code(code)
                    .await?
                    .ok_or_else(|| orchard_core::CouponError::Invalid(code.to_string()))?;
                let discount = discount_for(&coupon, subtotal, Utc::now())?;
                (discount, Some(code.to_string()))
            }
            None => (Money::zero(), None),
        };

        let totals = compute_totals(&items, discount, &self.policy);

        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();
        let order = Order {
            id: order_id.clone(),
            customer_id: customer_id.to_string(),
            status: OrderStatus::Placed,
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
            coupon_code,
            item_count: totals.item_count,
            shipping_address_json: serde_json::to_string(&request.shipping_address)?,
            billing_address_json: request
                .billing_address
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            idempotency_key: idempotency_key.clone(),
            placed_at: now,
        };

        let order_items: Vec<OrderLineItem> = items
            .iter()
            .map(|line| OrderLineItem::materialize(&order_id, line, now))
            .collect();

        match self
            .db
            .orders()
            .place(&order, &order_items, &cart.id, cart.version)
            .await
        {
            Ok(()) => Ok(OrderReceipt {
                order,
                items: order_items,
            }),
            // Lost a race against a concurrent submission of the same key:
            // the other checkout won, return its order.
            Err(e) if e.is_unique_violation_on("idempotency_key") => {
                let existing = self
                    .db
                    .orders()
                    .find_by_idempotency_key(&idempotency_key)
                    .await?
                    .ok_or(e)?;
                info!(order_id = %existing.id, "Concurrent checkout replay, returning existing order");
                let items = self.db.orders().items(&existing.id).await?;
                Ok(OrderReceipt {
                    order: existing,
                    items,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches one of the customer's orders with its items.
    pub async fn get_order(
        &self,
        customer_id: &str,
        order_id: &str,
    ) -> Result<OrderReceipt, StoreError> {
        validation::validate_customer_id(customer_id)?;

        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let items = self.db.orders().items(&order.id).await?;
        Ok(OrderReceipt { order, items })
    }

    /// Lists the customer's orders, newest first.
    pub async fn order_history(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Order>, StoreError> {
        validation::validate_customer_id(customer_id)?;

        Ok(self
            .db
            .orders()
            .list_for_customer(customer_id, limit)
            .await?)
    }
}
