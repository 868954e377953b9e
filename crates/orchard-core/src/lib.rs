//! # orchard-core: Pure Business Logic for Orchard Commerce
//!
//! Every storefront business rule lives in this crate as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              orchard-store (service layer)                  │
//! │      cart ops · coupon apply · checkout · reviews           │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼─────────────────────────────────┐
//! │              ★ orchard-core (THIS CRATE) ★                  │
//! │                                                             │
//! │   types      money       totals       coupon     validation │
//! │   Product    Money       aggregator   evaluator  rules      │
//! │   Cart       TaxRate     CartTotals   discounts  checks     │
//! │                                                             │
//! │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS        │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼─────────────────────────────────┐
//! │              orchard-db (storage layer)                     │
//! │        SQLite queries, migrations, repositories             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Cart, Coupon, Order, Review, ...)
//! - [`money`] - Money type with integer-cents arithmetic (no floating point)
//! - [`totals`] - Cart aggregator: subtotal/tax/shipping/discount/total
//! - [`coupon`] - Coupon evaluator
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation

pub mod coupon;
pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, CouponError, ValidationError};
pub use money::Money;
pub use totals::{compute_totals, CartTotals, CheckoutPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct line items allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Guards against accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
