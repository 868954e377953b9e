//! # Order Repository
//!
//! Order materialization and reads.
//!
//! ## Checkout Transaction
//! ```text
//! BEGIN
//!   INSERT order                (copied totals + serialized addresses)
//!   for each cart line:
//!     INSERT order_item         (immutable snapshot, review_eligible)
//!     UPDATE products           (conditional stock decrement)
//!   DELETE cart_items           (clear the cart)
//!   UPDATE carts (CAS)          (reset totals + coupon, version guard)
//! COMMIT
//! ```
//! Any failure - short stock, a cart mutated mid-checkout, a replayed
//! idempotency key - rolls the whole sequence back. There is no partial
//! state to compensate for.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::reserve_stock;
use orchard_core::{Order, OrderLineItem, OrderStatus};

const ORDER_COLUMNS: &str = "id, customer_id, status, subtotal_cents, tax_cents, shipping_cents, \
     discount_cents, total_cents, coupon_code, item_count, \
     shipping_address_json, billing_address_json, idempotency_key, placed_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, sku_snapshot, name_snapshot, \
     image_snapshot, unit_price_cents, quantity, line_total_cents, \
     review_eligible, created_at";

/// Repository for order storage operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Materializes an order from a cart, atomically.
    ///
    /// Inserts the order and all line items, reserves stock per product,
    /// and clears + resets the source cart, all in one transaction. The
    /// cart reset is a CAS on `cart_version`: if another session touched
    /// the cart after the caller read it, the checkout aborts instead of
    /// materializing a stale snapshot.
    ///
    /// ## Errors
    /// - `DbError::UniqueViolation` on `orders.idempotency_key` - this
    ///   checkout already went through; the caller fetches and returns the
    ///   existing order
    /// - `DbError::InsufficientStock` - a product can't cover its quantity
    /// - `DbError::VersionConflict` - the cart changed mid-checkout
    pub async fn place(
        &self,
        order: &Order,
        items: &[OrderLineItem],
        cart_id: &str,
        cart_version: i64,
    ) -> DbResult<()> {
        debug!(order_id = %order.id, cart_id = %cart_id, items = items.len(), "Placing order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (
                id, customer_id, status, subtotal_cents, tax_cents, shipping_cents,
                discount_cents, total_cents, coupon_code, item_count,
                shipping_address_json, billing_address_json, idempotency_key, placed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(&order.coupon_code)
        .bind(order.item_count)
        .bind(&order.shipping_address_json)
        .bind(&order.billing_address_json)
        .bind(&order.idempotency_key)
        .bind(order.placed_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (
                    id, order_id, product_id, sku_snapshot, name_snapshot,
                    image_snapshot, unit_price_cents, quantity, line_total_cents,
                    review_eligible, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(&item.image_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(item.review_eligible)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            reserve_stock(&mut tx, &item.product_id, item.quantity).await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let reset = sqlx::query(
            "UPDATE carts SET
                subtotal_cents = 0, tax_cents = 0, shipping_cents = 0,
                discount_cents = 0, total_cents = 0,
                item_count = 0, total_quantity = 0,
                coupon_code = NULL, updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(now)
        .bind(cart_id)
        .bind(cart_version)
        .execute(&mut *tx)
        .await?;

        if reset.rows_affected() == 0 {
            return Err(DbError::conflict("Cart", cart_id));
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total_cents = order.total_cents,
            items = items.len(),
            "Order placed"
        );
        Ok(())
    }

    /// Gets an order by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Finds the order created by a previous submission of the same
    /// idempotency key, if any.
    pub async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = ?"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all line items for an order.
    pub async fn items(&self, order_id: &str) -> DbResult<Vec<OrderLineItem>> {
        let items = sqlx::query_as::<_, OrderLineItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists a customer's orders, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = ? \
             ORDER BY placed_at DESC LIMIT ?"
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Moves an order to a new lifecycle status.
    /// Cancelled orders are terminal.
    pub async fn set_status(&self, order_id: &str, status: OrderStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = ? WHERE id = ? AND status != 'cancelled'",
        )
        .bind(status)
        .bind(order_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use orchard_core::{Address, CartLineItem, Product};
    use uuid::Uuid;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn test_product(sku: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
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
        }
    }

    fn test_address() -> Address {
        Address {
            recipient: "Ada Lovelace".to_string(),
            line1: "12 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            region: "LDN".to_string(),
            postal_code: "EC1A 1AA".to_string(),
            country: "GB".to_string(),
            phone: None,
        }
    }

    fn order_from(
        customer_id: &str,
        lines: &[CartLineItem],
        total_cents: i64,
        key: &str,
    ) -> (Order, Vec<OrderLineItem>) {
        let now = Utc::now();
        let order_id = Uuid::new_v4().to_string();
        let items: Vec<OrderLineItem> = lines
            .iter()
            .map(|l| OrderLineItem::materialize(&order_id, l, now))
            .collect();
        let subtotal: i64 = lines.iter().map(|l| l.line_total_cents).sum();
        let order = Order {
            id: order_id,
            customer_id: customer_id.to_string(),
            status: OrderStatus::Placed,
            subtotal_cents: subtotal,
            tax_cents: 0,
            shipping_cents: 0,
            discount_cents: 0,
            total_cents,
            coupon_code: None,
            item_count: lines.len() as i64,
            shipping_address_json: serde_json::to_string(&test_address()).unwrap(),
            billing_address_json: None,
            idempotency_key: key.to_string(),
            placed_at: now,
        };
        (order, items)
    }

    #[tokio::test]
    async fn place_materializes_order_and_clears_cart() {
        let db = db().await;
        let shirt = test_product("TEE-BLK-M", 4999, 10);
        let mug = test_product("MUG-12OZ", 1299, 10);
        db.products().insert(&shirt).await.unwrap();
        db.products().insert(&mug).await.unwrap();

        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let lines = vec![
            CartLineItem::snapshot(&cart.id, &shirt, 2),
            CartLineItem::snapshot(&cart.id, &mug, 1),
        ];
        for l in &lines {
            db.carts().insert_item(l).await.unwrap();
        }

        let (order, items) = order_from("cust-1", &lines, 11297, "key-1");
        db.orders()
            .place(&order, &items, &cart.id, cart.version)
            .await
            .unwrap();

        // One order, N line items
        let stored = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Placed);
        assert_eq!(stored.item_count, 2);
        let stored_items = db.orders().items(&order.id).await.unwrap();
        assert_eq!(stored_items.len(), 2);
        assert!(stored_items.iter().all(|i| i.review_eligible));

        // Stock moved, sold_count credited
        let shirt_after = db.products().get_by_id(&shirt.id).await.unwrap().unwrap();
        assert_eq!(shirt_after.stock, 8);
        assert_eq!(shirt_after.sold_count, 2);

        // Cart emptied and reset
        assert!(db.carts().items(&cart.id).await.unwrap().is_empty());
        let cart_after = db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(cart_after.total_cents, 0);
        assert_eq!(cart_after.item_count, 0);
        assert!(cart_after.coupon_code.is_none());
        assert_eq!(cart_after.version, cart.version + 1);
    }

    #[tokio::test]
    async fn short_stock_rolls_back_everything() {
        let db = db().await;
        let shirt = test_product("TEE-BLK-M", 4999, 10);
        let mug = test_product("MUG-12OZ", 1299, 1); // not enough for 3
        db.products().insert(&shirt).await.unwrap();
        db.products().insert(&mug).await.unwrap();

        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let lines = vec![
            CartLineItem::snapshot(&cart.id, &shirt, 2),
            CartLineItem::snapshot(&cart.id, &mug, 3),
        ];
        for l in &lines {
            db.carts().insert_item(l).await.unwrap();
        }

        let (order, items) = order_from("cust-1", &lines, 13896, "key-1");
        let err = db
            .orders()
            .place(&order, &items, &cart.id, cart.version)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));

        // No order, no items, no stock movement, cart untouched
        assert!(db.orders().get_by_id(&order.id).await.unwrap().is_none());
        assert!(db.orders().items(&order.id).await.unwrap().is_empty());
        let shirt_after = db.products().get_by_id(&shirt.id).await.unwrap().unwrap();
        assert_eq!(shirt_after.stock, 10);
        assert_eq!(shirt_after.sold_count, 0);
        assert_eq!(db.carts().items(&cart.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn replayed_idempotency_key_is_a_unique_violation() {
        let db = db().await;
        let shirt = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&shirt).await.unwrap();

        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let lines = vec![CartLineItem::snapshot(&cart.id, &shirt, 1)];
        db.carts().insert_item(&lines[0]).await.unwrap();

        let (order, items) = order_from("cust-1", &lines, 4999, "key-1");
        db.orders()
            .place(&order, &items, &cart.id, cart.version)
            .await
            .unwrap();

        // Same key again (new order id, stale cart state)
        let (order2, items2) = order_from("cust-1", &lines, 4999, "key-1");
        let err = db
            .orders()
            .place(&order2, &items2, &cart.id, cart.version)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on("idempotency_key"));

        // The replay reserved no additional stock
        let shirt_after = db.products().get_by_id(&shirt.id).await.unwrap().unwrap();
        assert_eq!(shirt_after.stock, 9);

        let found = db
            .orders()
            .find_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, order.id);
    }

    #[tokio::test]
    async fn stale_cart_version_aborts_checkout() {
        let db = db().await;
        let shirt = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&shirt).await.unwrap();

        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let lines = vec![CartLineItem::snapshot(&cart.id, &shirt, 1)];
        db.carts().insert_item(&lines[0]).await.unwrap();

        let (order, items) = order_from("cust-1", &lines, 4999, "key-1");
        // Cart was written after the caller read version
        let err = db
            .orders()
            .place(&order, &items, &cart.id, cart.version + 7)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { .. }));

        // Rolled back: no order, stock untouched
        assert!(db.orders().get_by_id(&order.id).await.unwrap().is_none());
        let shirt_after = db.products().get_by_id(&shirt.id).await.unwrap().unwrap();
        assert_eq!(shirt_after.stock, 10);
    }

    #[tokio::test]
    async fn status_lifecycle() {
        let db = db().await;
        let shirt = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&shirt).await.unwrap();
        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let lines = vec![CartLineItem::snapshot(&cart.id, &shirt, 1)];
        db.carts().insert_item(&lines[0]).await.unwrap();
        let (order, items) = order_from("cust-1", &lines, 4999, "key-1");
        db.orders()
            .place(&order, &items, &cart.id, cart.version)
            .await
            .unwrap();

        db.orders()
            .set_status(&order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        let stored = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Shipped);
    }
}
