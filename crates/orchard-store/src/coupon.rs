//! # Coupon Service
//!
//! Applying and removing discount codes on a cart.
//!
//! A failed evaluation returns its error without touching the cart: the
//! stored discount only ever changes on a successful apply, a remove, or a
//! recompute that drops a no-longer-valid coupon. No stacking: applying a
//! coupon replaces any previous one.

use chrono::Utc;
use tracing::{debug, info};

use orchard_core::{
    compute_totals, coupon::discount_for, validation, CartLineItem, CheckoutPolicy, CoreError,
    CouponError, Money,
};
use orchard_db::{Database, DbError};

use crate::cart::CartView;
use crate::error::StoreError;

/// Coupon application operations.
#[derive(Debug, Clone)]
pub struct CouponService {
    db: Database,
    policy: CheckoutPolicy,
}

impl CouponService {
    pub fn new(db: Database, policy: CheckoutPolicy) -> Self {
        CouponService { db, policy }
    }

    /// Applies a coupon code to the customer's cart.
    ///
    /// Evaluates the code against the current subtotal and, on success,
    /// persists code + discount and reruns the aggregator. The write is a
    /// CAS retried once against fresh state.
    pub async fn apply(&self, customer_id: &str, code: &str) -> Result<CartView, StoreError> {
        debug!(customer_id = %customer_id, code = %code, "apply coupon");

        validation::validate_customer_id(customer_id)?;
        let code = validation::validate_coupon_code(code)?;

        let coupon = self
            .db
            .coupons()
            .find_by_code(&code)
            .await?
            .ok_or_else(|| CouponError::Invalid(code.clone()))?;

        let mut retried = false;

        loop {
            let cart = self.db.carts().get_or_create(customer_id).await?;
            let items = self.db.carts().items(&cart.id).await?;

            if items.is_empty() {
                return Err(CoreError::EmptyCart.into());
            }

            let subtotal: Money = items.iter().map(CartLineItem::line_total).sum();
            let discount = discount_for(&coupon, subtotal, Utc::now())?;

            let totals = compute_totals(&items, discount, &self.policy);

            match self
                .db
                .carts()
                .store_totals(&cart.id, cart.version, &totals, Some(&code))
                .await
            {
                Ok(_) => {
                    info!(
                        cart_id = %cart.id,
                        code = %code,
                        discount_cents = totals.discount_cents,
                        "Coupon applied"
                    );
                    let cart = self
                        .db
                        .carts()
                        .get_by_id(&cart.id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart", &cart.id))?;
                    return Ok(CartView { cart, items });
                }
                Err(DbError::VersionConflict { .. }) if !retried => {
                    debug!(cart_id = %cart.id, "CAS conflict applying coupon, retrying");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Removes the applied coupon and recomputes totals without a discount.
    pub async fn remove(&self, customer_id: &str) -> Result<CartView, StoreError> {
        debug!(customer_id = %customer_id, "remove coupon");

        validation::validate_customer_id(customer_id)?;

        let mut retried = false;

        loop {
            let cart = self.db.carts().get_or_create(customer_id).await?;
            let items = self.db.carts().items(&cart.id).await?;

            let totals = compute_totals(&items, Money::zero(), &self.policy);

            match self
                .db
                .carts()
                .store_totals(&cart.id, cart.version, &totals, None)
                .await
            {
                Ok(_) => {
                    info!(cart_id = %cart.id, "Coupon removed");
                    let cart = self
                        .db
                        .carts()
                        .get_by_id(&cart.id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart", &cart.id))?;
                    return Ok(CartView { cart, items });
                }
                Err(DbError::VersionConflict { .. }) if !retried => {
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
