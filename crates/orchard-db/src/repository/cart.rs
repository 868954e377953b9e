//! # Cart Repository
//!
//! One cart per customer, denormalized totals, compare-and-swap writes.
//!
//! ## Why CAS?
//! ```text
//! Tab A: read cart v4 ── compute ── write WHERE version = 4  ✓ (now v5)
//! Tab B: read cart v4 ── compute ── write WHERE version = 4  ✗ 0 rows
//!                                                            └► VersionConflict
//! ```
//! The losing write observes the conflict and recomputes against fresh
//! state instead of silently clobbering the winner (the classic lost-update
//! anomaly of blind overwrites).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use orchard_core::{Cart, CartLineItem, CartTotals};

const CART_COLUMNS: &str = "id, customer_id, subtotal_cents, tax_cents, shipping_cents, \
     discount_cents, total_cents, item_count, total_quantity, coupon_code, \
     created_at, updated_at, version";

const ITEM_COLUMNS: &str = "id, cart_id, product_id, sku_snapshot, name_snapshot, \
     image_snapshot, unit_price_cents, quantity, line_total_cents, added_at";

/// Repository for cart and cart line item storage operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets a cart by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets the cart owned by a customer.
    pub async fn get_by_customer(&self, customer_id: &str) -> DbResult<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE customer_id = ?"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    /// Gets the customer's cart, creating an empty one on first use.
    ///
    /// Two sessions racing to create the first cart both end up with the
    /// same row: the loser of the UNIQUE(customer_id) race refetches.
    pub async fn get_or_create(&self, customer_id: &str) -> DbResult<Cart> {
        if let Some(cart) = self.get_by_customer(customer_id).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart = Cart {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            subtotal_cents: 0,
            tax_cents: 0,
            shipping_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            item_count: 0,
            total_quantity: 0,
            coupon_code: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        debug!(customer_id = %customer_id, cart_id = %cart.id, "Creating cart");

        let inserted = sqlx::query(
            "INSERT INTO carts (
                id, customer_id, subtotal_cents, tax_cents, shipping_cents,
                discount_cents, total_cents, item_count, total_quantity,
                coupon_code, created_at, updated_at, version
            ) VALUES (?, ?, 0, 0, 0, 0, 0, 0, 0, NULL, ?, ?, 0)",
        )
        .bind(&cart.id)
        .bind(customer_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(cart),
            Err(e) => {
                let e: DbError = e.into();
                if matches!(e, DbError::UniqueViolation { .. }) {
                    self.get_by_customer(customer_id)
                        .await?
                        .ok_or_else(|| DbError::not_found("Cart", customer_id))
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Gets all line items for a cart, in the order they were added.
    pub async fn items(&self, cart_id: &str) -> DbResult<Vec<CartLineItem>> {
        let items = sqlx::query_as::<_, CartLineItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ? ORDER BY added_at, id"
        ))
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Finds the line for a specific product, if present.
    pub async fn find_item(
        &self,
        cart_id: &str,
        product_id: &str,
    ) -> DbResult<Option<CartLineItem>> {
        let item = sqlx::query_as::<_, CartLineItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = ? AND product_id = ?"
        ))
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Inserts a new line item (product snapshot included).
    pub async fn insert_item(&self, item: &CartLineItem) -> DbResult<()> {
        debug!(cart_id = %item.cart_id, product_id = %item.product_id, "Adding cart line");

        sqlx::query(
            "INSERT INTO cart_items (
                id, cart_id, product_id, sku_snapshot, name_snapshot,
                image_snapshot, unit_price_cents, quantity, line_total_cents, added_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.cart_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(&item.image_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.added_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes back a line's quantity and denormalized line total.
    pub async fn update_item(&self, item: &CartLineItem) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = ?, line_total_cents = ? WHERE id = ?",
        )
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(&item.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", &item.id));
        }

        Ok(())
    }

    /// Removes a single line item.
    pub async fn delete_item(&self, item_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", item_id));
        }

        Ok(())
    }

    /// Removes all line items from a cart. Returns how many were removed.
    pub async fn clear_items(&self, cart_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Compare-and-swap write of the cart's denormalized totals.
    ///
    /// Succeeds only when the row still carries `expected_version`; the
    /// version is bumped in the same statement. On success returns the new
    /// version.
    ///
    /// ## Errors
    /// - `DbError::VersionConflict` - someone else wrote the cart first
    /// - `DbError::NotFound` - no such cart
    pub async fn store_totals(
        &self,
        cart_id: &str,
        expected_version: i64,
        totals: &CartTotals,
        coupon_code: Option<&str>,
    ) -> DbResult<i64> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE carts SET
                subtotal_cents = ?,
                tax_cents = ?,
                shipping_cents = ?,
                discount_cents = ?,
                total_cents = ?,
                item_count = ?,
                total_quantity = ?,
                coupon_code = ?,
                updated_at = ?,
                version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(totals.subtotal_cents)
        .bind(totals.tax_cents)
        .bind(totals.shipping_cents)
        .bind(totals.discount_cents)
        .bind(totals.total_cents)
        .bind(totals.item_count)
        .bind(totals.total_quantity)
        .bind(coupon_code)
        .bind(now)
        .bind(cart_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.get_by_id(cart_id).await?.is_some() {
                Err(DbError::conflict("Cart", cart_id))
            } else {
                Err(DbError::not_found("Cart", cart_id))
            };
        }

        debug!(cart_id = %cart_id, version = expected_version + 1, "Cart totals stored");
        Ok(expected_version + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orchard_core::{compute_totals, CheckoutPolicy, Money, Product};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn test_product(sku: &str, price_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            image_url: None,
            category: None,
            price_cents,
            stock: 100,
            sold_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_stable_per_customer() {
        let db = db().await;

        let first = db.carts().get_or_create("cust-1").await.unwrap();
        let second = db.carts().get_or_create("cust-1").await.unwrap();
        assert_eq!(first.id, second.id);

        let other = db.carts().get_or_create("cust-2").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn line_item_crud() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999);
        db.products().insert(&product).await.unwrap();
        let cart = db.carts().get_or_create("cust-1").await.unwrap();

        let mut line = CartLineItem::snapshot(&cart.id, &product, 2);
        db.carts().insert_item(&line).await.unwrap();

        let found = db
            .carts()
            .find_item(&cart.id, &product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.quantity, 2);
        assert_eq!(found.line_total_cents, 9998);

        line.set_quantity(5);
        db.carts().update_item(&line).await.unwrap();
        let items = db.carts().items(&cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);

        db.carts().delete_item(&line.id).await.unwrap();
        assert!(db.carts().items(&cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_product_twice_violates_line_uniqueness() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999);
        db.products().insert(&product).await.unwrap();
        let cart = db.carts().get_or_create("cust-1").await.unwrap();

        db.carts()
            .insert_item(&CartLineItem::snapshot(&cart.id, &product, 1))
            .await
            .unwrap();
        let err = db
            .carts()
            .insert_item(&CartLineItem::snapshot(&cart.id, &product, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn store_totals_is_compare_and_swap() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 5000);
        db.products().insert(&product).await.unwrap();
        let cart = db.carts().get_or_create("cust-1").await.unwrap();

        let items = vec![CartLineItem::snapshot(&cart.id, &product, 2)];
        db.carts().insert_item(&items[0]).await.unwrap();
        let totals = compute_totals(&items, Money::zero(), &CheckoutPolicy::default());

        // First write with the correct version succeeds and bumps it
        let v1 = db
            .carts()
            .store_totals(&cart.id, cart.version, &totals, None)
            .await
            .unwrap();
        assert_eq!(v1, cart.version + 1);

        // A second write against the stale version must conflict
        let err = db
            .carts()
            .store_totals(&cart.id, cart.version, &totals, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        // The persisted row carries the first write
        let stored = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, totals.total_cents);
        assert_eq!(stored.version, v1);
    }

    #[tokio::test]
    async fn store_totals_on_missing_cart_is_not_found() {
        let db = db().await;
        let err = db
            .carts()
            .store_totals("no-such-cart", 0, &CartTotals::zero(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
