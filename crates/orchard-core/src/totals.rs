//! # Cart Totals
//!
//! The cart aggregator: recomputes every denormalized cart total from the
//! current line items and the applied discount.
//!
//! ## Recompute Flow
//! ```text
//! add / update / remove line item
//!        │
//!        ▼
//! compute_totals(items, discount, policy)   ◄── THIS MODULE
//!        │
//!        ▼
//! { subtotal, tax, shipping, discount, total }
//!        │
//!        ▼
//! compare-and-swap write of the cart row (orchard-db)
//! ```
//!
//! Totals are never authored anywhere else; every persisted cart row was
//! produced by this function, which is what keeps the invariant
//! `total == subtotal + tax + shipping - discount` true by construction.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CartLineItem, TaxRate};

// =============================================================================
// Checkout Policy
// =============================================================================

/// Storefront pricing policy: tax rate and shipping rules.
///
/// Values come from configuration (`orchard-store`); the defaults match the
/// storefront's standard terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutPolicy {
    /// Sales tax applied to the subtotal.
    pub tax_rate: TaxRate,

    /// Flat shipping fee in cents for orders below the threshold.
    pub shipping_flat_cents: i64,

    /// Subtotals at or above this ship free. Inclusive boundary: a subtotal
    /// of exactly the threshold ships free.
    pub free_shipping_threshold_cents: i64,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            tax_rate: TaxRate::from_bps(1000), // 10%
            shipping_flat_cents: 1000,         // $10.00
            free_shipping_threshold_cents: 10000, // $100.00
        }
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// The aggregator's output: every denormalized total a cart row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    /// Distinct line items.
    pub item_count: i64,

    /// Total units across all lines.
    pub total_quantity: i64,
}

impl CartTotals {
    /// All-zero totals: the state of an empty cart.
    pub const fn zero() -> Self {
        CartTotals {
            subtotal_cents: 0,
            tax_cents: 0,
            shipping_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            item_count: 0,
            total_quantity: 0,
        }
    }
}

/// Recomputes cart totals from line items and an already-evaluated discount.
///
/// ## Rules
/// - subtotal = Σ line totals
/// - tax = policy tax rate applied to the subtotal (half-up rounding)
/// - shipping = 0 for an empty cart, 0 at or above the free-shipping
///   threshold, else the flat fee
/// - discount is clamped to the subtotal
/// - total = subtotal + tax + shipping - discount
///
/// An empty item slice yields [`CartTotals::zero`] regardless of discount:
/// removing the last line item resets everything, coupon included.
///
/// ```rust
/// use orchard_core::money::Money;
/// use orchard_core::totals::{compute_totals, CheckoutPolicy};
///
/// let totals = compute_totals(&[], Money::zero(), &CheckoutPolicy::default());
/// assert_eq!(totals.total_cents, 0);
/// ```
pub fn compute_totals(
    items: &[CartLineItem],
    discount: Money,
    policy: &CheckoutPolicy,
) -> CartTotals {
    if items.is_empty() {
        return CartTotals::zero();
    }

    let subtotal: Money = items.iter().map(CartLineItem::line_total).sum();
    let tax = subtotal.percent_bps(policy.tax_rate.bps());

    let shipping = if subtotal.cents() >= policy.free_shipping_threshold_cents {
        Money::zero()
    } else {
        Money::from_cents(policy.shipping_flat_cents)
    };

    let discount = discount.min(subtotal);
    let total = subtotal + tax + shipping - discount;

    CartTotals {
        subtotal_cents: subtotal.cents(),
        tax_cents: tax.cents(),
        shipping_cents: shipping.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        item_count: items.len() as i64,
        total_quantity: items.iter().map(|i| i.quantity).sum(),
    }
}
