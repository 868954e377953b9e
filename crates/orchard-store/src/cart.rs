//! # Cart Service
//!
//! Cart mutations with totals recompute after every change.
//!
//! ## Operation Shape
//! ```text
//! add_item / update_quantity / remove_item / clear
//!        │
//!        ├── validate input, snapshot product data
//!        ├── write the line item row
//!        │
//!        ▼
//! recompute:  read cart + items ── resolve discount ── compute_totals
//!        │
//!        ▼
//! CAS write (WHERE version = ?) ──── conflict? ── retry once against
//!                                                 fresh state, then give up
//! ```
//! The retry covers the common benign race (two quick clicks); a second
//! conflict surfaces `CONFLICT` so the client re-reads instead of anyone
//! losing an update.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use orchard_core::{
    compute_totals, validation, Cart, CartLineItem, CheckoutPolicy, CoreError, Money,
    MAX_ITEM_QUANTITY,
};
use orchard_db::{Database, DbError};

use crate::error::StoreError;

/// A cart with its line items, as returned to the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartLineItem>,
}

/// Storefront cart operations for one database + pricing policy.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    policy: CheckoutPolicy,
}

impl CartService {
    pub fn new(db: Database, policy: CheckoutPolicy) -> Self {
        CartService { db, policy }
    }

    /// Returns the customer's cart, creating an empty one on first use.
    pub async fn get(&self, customer_id: &str) -> Result<CartView, StoreError> {
        validation::validate_customer_id(customer_id)?;

        let cart = self.db.carts().get_or_create(customer_id).await?;
        let items = self.db.carts().items(&cart.id).await?;
        Ok(CartView { cart, items })
    }

    /// Adds a product to the cart, merging quantities when the product is
    /// already present. Snapshots name/sku/image/price at this moment.
    pub async fn add_item(
        &self,
        customer_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<CartView, StoreError> {
        debug!(customer_id = %customer_id, product_id = %product_id, quantity, "add_item");

        validation::validate_customer_id(customer_id)?;
        validation::validate_quantity(quantity)?;

        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let cart = self.db.carts().get_or_create(customer_id).await?;

        match self.db.carts().find_item(&cart.id, &product.id).await? {
            Some(mut line) => {
                let new_qty = line.quantity + quantity;
                if new_qty > MAX_ITEM_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested: new_qty,
                        max: MAX_ITEM_QUANTITY,
                    }
                    .into());
                }
                self.check_stock(&product, new_qty)?;
                line.set_quantity(new_qty);
                self.db.carts().update_item(&line).await?;
            }
            None => {
                let line_count = self.db.carts().items(&cart.id).await?.len();
                validation::validate_cart_size(line_count)?;
                self.check_stock(&product, quantity)?;
                let line = CartLineItem::snapshot(&cart.id, &product, quantity);
                self.db.carts().insert_item(&line).await?;
            }
        }

        self.recompute(&cart.id).await
    }

    /// Sets a line's quantity. Zero removes the line.
    pub async fn update_quantity(
        &self,
        customer_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> Result<CartView, StoreError> {
        if quantity == 0 {
            return self.remove_item(customer_id, product_id).await;
        }

        debug!(customer_id = %customer_id, product_id = %product_id, quantity, "update_quantity");

        validation::validate_customer_id(customer_id)?;
        validation::validate_quantity(quantity)?;

        let cart = self.db.carts().get_or_create(customer_id).await?;
        let mut line = self
            .db
            .carts()
            .find_item(&cart.id, product_id)
            .await?
            .ok_or_else(|| CoreError::ItemNotInCart {
                product_id: product_id.to_string(),
            })?;

        if let Some(product) = self.db.products().get_by_id(product_id).await? {
            self.check_stock(&product, quantity)?;
        }

        line.set_quantity(quantity);
        self.db.carts().update_item(&line).await?;

        self.recompute(&cart.id).await
    }

    /// Removes a product's line from the cart.
    pub async fn remove_item(
        &self,
        customer_id: &str,
        product_id: &str,
    ) -> Result<CartView, StoreError> {
        debug!(customer_id = %customer_id, product_id = %product_id, "remove_item");

        validation::validate_customer_id(customer_id)?;

        let cart = self.db.carts().get_or_create(customer_id).await?;
        let line = self
            .db
            .carts()
            .find_item(&cart.id, product_id)
            .await?
            .ok_or_else(|| CoreError::ItemNotInCart {
                product_id: product_id.to_string(),
            })?;

        self.db.carts().delete_item(&line.id).await?;

        self.recompute(&cart.id).await
    }

    /// Removes every line from the cart.
    pub async fn clear(&self, customer_id: &str) -> Result<CartView, StoreError> {
        debug!(customer_id = %customer_id, "clear cart");

        validation::validate_customer_id(customer_id)?;

        let cart = self.db.carts().get_or_create(customer_id).await?;
        let removed = self.db.carts().clear_items(&cart.id).await?;
        debug!(cart_id = %cart.id, removed, "Cart lines removed");

        self.recompute(&cart.id).await
    }

    /// Advisory stock check at cart time. The authoritative check is the
    /// conditional decrement inside the checkout transaction; this one just
    /// keeps obviously unfulfillable lines out of carts.
    fn check_stock(&self, product: &orchard_core::Product, quantity: i64) -> Result<(), StoreError> {
        if !product.can_fulfill(quantity) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.stock,
                requested: quantity,
            }
            .into());
        }
        Ok(())
    }

    /// Recomputes totals from current state and CAS-writes them, retrying
    /// once against fresh state when another session wrote first.
    pub(crate) async fn recompute(&self, cart_id: &str) -> Result<CartView, StoreError> {
        let mut retried = false;

        loop {
            let cart = self
                .db
                .carts()
                .get_by_id(cart_id)
                .await?
                .ok_or_else(|| DbError::not_found("Cart", cart_id))?;
            let items = self.db.carts().items(cart_id).await?;

            let (discount, coupon_code) = self.resolve_discount(&cart, &items).await?;
            let totals = compute_totals(&items, discount, &self.policy);

            match self
                .db
                .carts()
                .store_totals(cart_id, cart.version, &totals, coupon_code.as_deref())
                .await
            {
                Ok(_) => {
                    let cart = self
                        .db
                        .carts()
                        .get_by_id(cart_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart", cart_id))?;
                    info!(
                        cart_id = %cart_id,
                        total_cents = cart.total_cents,
                        items = items.len(),
                        "Cart totals recomputed"
                    );
                    return Ok(CartView { cart, items });
                }
                Err(DbError::VersionConflict { .. }) if !retried => {
                    debug!(cart_id = %cart_id, "CAS conflict, recomputing against fresh state");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Resolves the discount for the cart's applied coupon against current
    /// items. A coupon that no longer applies (deactivated, expired, minimum
    /// no longer met) is dropped rather than left stale; an emptied cart
    /// always drops its coupon.
    async fn resolve_discount(
        &self,
        cart: &Cart,
        items: &[CartLineItem],
    ) -> Result<(Money, Option<String>), StoreError> {
        let Some(code) = cart.coupon_code.as_deref() else {
            return Ok((Money::zero(), None));
        };

        if items.is_empty() {
            return Ok((Money::zero(), None));
        }

        let subtotal: Money = items.iter().map(CartLineItem::line_total).sum();

        match self.db.coupons().find_by_code(code).await? {
            Some(coupon) => match orchard_core::coupon::discount_for(&coupon, subtotal, Utc::now())
            {
                Ok(discount) => Ok((discount, Some(code.to_string()))),
                Err(e) => {
                    info!(code = %code, reason = %e, "Dropping coupon that no longer applies");
                    Ok((Money::zero(), None))
                }
            },
            None => {
                info!(code = %code, "Dropping coupon that no longer exists");
                Ok((Money::zero(), None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchard_core::Product;
    use orchard_db::DbConfig;
    use uuid::Uuid;

    use crate::error::ErrorCode;

    async fn service() -> CartService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CartService::new(db, CheckoutPolicy::default())
    }

    async fn seed_product(svc: &CartService, sku: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            image_url: None,
            category: None,
            price_cents,
            stock,
            sold_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        svc.db.products().insert(&product).await.unwrap();
        product
    }

    fn assert_invariant(cart: &Cart) {
        assert_eq!(
            cart.total_cents,
            cart.subtotal_cents + cart.tax_cents + cart.shipping_cents - cart.discount_cents
        );
    }

    #[tokio::test]
    async fn worked_example_fifty_dollars_times_two() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 5000, 10).await;

        let view = svc.add_item("cust-1", &tee.id, 2).await.unwrap();

        assert_eq!(view.cart.subtotal_cents, 10000);
        assert_eq!(view.cart.shipping_cents, 0); // inclusive free-shipping boundary
        assert_eq!(view.cart.tax_cents, 1000);
        assert_eq!(view.cart.total_cents, 11000);
        assert_invariant(&view.cart);
    }

    #[tokio::test]
    async fn totals_recompute_after_every_mutation() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;
        let mug = seed_product(&svc, "MUG-12OZ", 1299, 50).await;

        let v1 = svc.add_item("cust-1", &tee.id, 1).await.unwrap();
        assert_eq!(v1.cart.subtotal_cents, 1999);
        assert_eq!(v1.cart.shipping_cents, 1000);
        assert_invariant(&v1.cart);

        let v2 = svc.add_item("cust-1", &mug.id, 2).await.unwrap();
        assert_eq!(v2.cart.subtotal_cents, 1999 + 2598);
        assert_eq!(v2.cart.item_count, 2);
        assert_eq!(v2.cart.total_quantity, 3);
        assert_invariant(&v2.cart);

        let v3 = svc.update_quantity("cust-1", &tee.id, 4).await.unwrap();
        assert_eq!(v3.cart.subtotal_cents, 4 * 1999 + 2598);
        assert_invariant(&v3.cart);

        let v4 = svc.remove_item("cust-1", &mug.id).await.unwrap();
        assert_eq!(v4.cart.subtotal_cents, 4 * 1999);
        assert_invariant(&v4.cart);
    }

    #[tokio::test]
    async fn adding_same_product_merges_quantities() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;

        svc.add_item("cust-1", &tee.id, 2).await.unwrap();
        let view = svc.add_item("cust-1", &tee.id, 3).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].quantity, 5);
        assert_eq!(view.cart.total_quantity, 5);
    }

    #[tokio::test]
    async fn removing_last_item_resets_all_totals() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;

        svc.add_item("cust-1", &tee.id, 1).await.unwrap();
        let view = svc.remove_item("cust-1", &tee.id).await.unwrap();

        assert_eq!(view.cart.subtotal_cents, 0);
        assert_eq!(view.cart.tax_cents, 0);
        assert_eq!(view.cart.shipping_cents, 0);
        assert_eq!(view.cart.discount_cents, 0);
        assert_eq!(view.cart.total_cents, 0);
        assert_eq!(view.cart.item_count, 0);
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn update_to_zero_removes_the_line() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;

        svc.add_item("cust-1", &tee.id, 2).await.unwrap();
        let view = svc.update_quantity("cust-1", &tee.id, 0).await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.cart.total_cents, 0);
    }

    #[tokio::test]
    async fn unknown_product_is_rejected() {
        let svc = service().await;
        let err = svc.add_item("cust-1", "no-such-product", 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn inactive_product_is_rejected() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;
        svc.db.products().soft_delete(&tee.id).await.unwrap();

        let err = svc.add_item("cust-1", &tee.id, 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn cart_add_respects_stock() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 3).await;

        let err = svc.add_item("cust-1", &tee.id, 5).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);

        // Merged quantity counts against stock too
        svc.add_item("cust-1", &tee.id, 2).await.unwrap();
        let err = svc.add_item("cust-1", &tee.id, 2).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn removing_missing_line_is_a_cart_error() {
        let svc = service().await;
        seed_product(&svc, "TEE-BLK-M", 1999, 50).await;

        let err = svc.remove_item("cust-1", "ghost").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }

    #[tokio::test]
    async fn clear_empties_the_cart() {
        let svc = service().await;
        let tee = seed_product(&svc, "TEE-BLK-M", 1999, 50).await;
        let mug = seed_product(&svc, "MUG-12OZ", 1299, 50).await;

        svc.add_item("cust-1", &tee.id, 1).await.unwrap();
        svc.add_item("cust-1", &mug.id, 1).await.unwrap();

        let view = svc.clear("cust-1").await.unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.cart.total_cents, 0);
    }
}
