//! # Domain Types
//!
//! Core storefront domain types.
//!
//! ## Type Hierarchy
//! ```text
//! Product ──snapshot──► CartLineItem ──materialize──► OrderLineItem
//!                            │                             │
//!                          Cart ───────checkout──────────► Order
//!                            ▲                             │
//!                          Coupon                        Review
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business key where one exists (product `sku`, coupon `code`)
//!
//! ## Snapshot Pattern
//! Cart and order line items carry frozen copies of product data (sku, name,
//! image, unit price) taken at the moment of adding. A later product edit
//! never rewrites what a customer saw in their cart or paid in an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in basis points (1 bps = 0.01%; 1000 bps = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage, for display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available in the storefront catalog.
///
/// Stock and sold-count are only ever mutated by checkout (conditional
/// decrement) and explicit restocks; see `orchard-db`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown in listings and on line item snapshots.
    pub name: String,

    /// Optional long description.
    pub description: Option<String>,

    /// Primary image URL, copied into line item snapshots.
    pub image_url: Option<String>,

    /// Category slug for listing pages.
    pub category: Option<String>,

    /// Price in cents.
    pub price_cents: i64,

    /// Units currently available for sale.
    pub stock: i64,

    /// Units sold across all orders.
    pub sold_count: i64,

    /// Whether product is visible and purchasable (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Bumped on every write; not used for CAS (carts are, see [`Cart`]).
    pub version: i64,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity can currently be fulfilled.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A customer's shopping cart. One per customer.
///
/// Totals are denormalized: recomputed by the aggregator after every
/// mutation, never independently authored. `version` increases on every
/// write and is the compare-and-swap guard that keeps two concurrent
/// sessions from silently losing each other's updates.
///
/// ## Invariant
/// `total == subtotal + tax + shipping - discount`, with
/// `discount <= subtotal`. Holds because totals only come out of
/// [`crate::totals::compute_totals`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cart {
    pub id: String,

    /// Owning customer. Unique: a customer has exactly one cart.
    pub customer_id: String,

    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    /// Number of distinct line items.
    pub item_count: i64,

    /// Total units across all line items.
    pub total_quantity: i64,

    /// Code of the applied coupon, if any.
    pub coupon_code: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Optimistic concurrency version for CAS writes.
    pub version: i64,
}

impl Cart {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

// =============================================================================
// Cart Line Item
// =============================================================================

/// A line in a cart: one product at a frozen unit price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartLineItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,

    /// SKU at time of adding (frozen).
    pub sku_snapshot: String,

    /// Product name at time of adding (frozen).
    pub name_snapshot: String,

    /// Image URL at time of adding (frozen).
    pub image_snapshot: Option<String>,

    /// Unit price in cents at time of adding (frozen).
    pub unit_price_cents: i64,

    pub quantity: i64,

    /// unit_price × quantity, denormalized.
    pub line_total_cents: i64,

    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLineItem {
    /// Snapshots a product into a new cart line.
    pub fn snapshot(cart_id: &str, product: &Product, quantity: i64) -> Self {
        CartLineItem {
            id: Uuid::new_v4().to_string(),
            cart_id: cart_id.to_string(),
            product_id: product.id.clone(),
            sku_snapshot: product.sku.clone(),
            name_snapshot: product.name.clone(),
            image_snapshot: product.image_url.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price_cents * quantity,
            added_at: Utc::now(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// Changes the quantity and keeps the denormalized line total in step.
    pub fn set_quantity(&mut self, quantity: i64) {
        self.quantity = quantity;
        self.line_total_cents = self.unit_price_cents * quantity;
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// How a coupon's `value` field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is basis points off the subtotal (1000 = 10%).
    Percentage,
    /// `value` is a flat amount in cents.
    Fixed,
}

/// A discount code. Read-only from the storefront's perspective.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Coupon {
    pub id: String,

    /// Business key, unique, matched case-insensitively on apply.
    pub code: String,

    pub kind: CouponKind,

    /// Basis points for `Percentage`, cents for `Fixed`.
    pub value: i64,

    /// Validity window start.
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,

    /// Validity window end.
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,

    /// Subtotal must reach this before the coupon applies.
    pub min_order_cents: i64,

    /// Cap on the computed discount. Only meaningful for `Percentage`.
    pub max_discount_cents: Option<i64>,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order
// =============================================================================

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Shipped,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Placed
    }
}

/// An immutable snapshot created at checkout.
///
/// Totals are copied from the cart as of the moment of materialization;
/// addresses are serialized JSON ([`Address`]).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,

    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub coupon_code: Option<String>,

    /// Number of line items in the order.
    pub item_count: i64,

    /// Serialized [`Address`].
    pub shipping_address_json: String,

    /// Serialized [`Address`], when different from shipping.
    pub billing_address_json: Option<String>,

    /// Client-supplied key making checkout replay-safe. Unique.
    pub idempotency_key: String,

    #[ts(as = "String")]
    pub placed_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Deserializes the shipping address snapshot.
    pub fn shipping_address(&self) -> Result<Address, serde_json::Error> {
        serde_json::from_str(&self.shipping_address_json)
    }

    /// Deserializes the billing address snapshot, if one was captured.
    pub fn billing_address(&self) -> Result<Option<Address>, serde_json::Error> {
        self.billing_address_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
    }
}

// =============================================================================
// Order Line Item
// =============================================================================

/// Immutable per-order copy of a cart line, plus review eligibility.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLineItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,

    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub image_snapshot: Option<String>,

    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,

    /// Whether the purchaser may submit a review for this line.
    pub review_eligible: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderLineItem {
    /// Materializes a cart line into an immutable order line.
    pub fn materialize(order_id: &str, item: &CartLineItem, now: DateTime<Utc>) -> Self {
        OrderLineItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: item.product_id.clone(),
            sku_snapshot: item.sku_snapshot.clone(),
            name_snapshot: item.name_snapshot.clone(),
            image_snapshot: item.image_snapshot.clone(),
            unit_price_cents: item.unit_price_cents,
            quantity: item.quantity,
            line_total_cents: item.line_total_cents,
            review_eligible: true,
            created_at: now,
        }
    }
}

// =============================================================================
// Review
// =============================================================================

/// Moderation state of a customer review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// A customer review tied to a purchased order line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Review {
    pub id: String,
    pub product_id: String,

    /// The purchased line this review is for. One review per line.
    pub order_item_id: String,

    pub customer_id: String,

    /// Star rating, 1-5.
    pub rating: i64,

    pub body: String,

    pub status: ReviewStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Address
// =============================================================================

/// Shipping/billing address, serialized to JSON inside order records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Address {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}
