//! # Product Repository
//!
//! Catalog reads plus the stock mutations checkout depends on.
//!
//! ## Stock Update Strategy
//! ```text
//! ❌ read-then-write (oversells under concurrency):
//!    let p = get(id);  update stock = p.stock - qty;
//!
//! ✅ single conditional update:
//!    UPDATE products SET stock = stock - ?, sold_count = sold_count + ?
//!    WHERE id = ? AND stock >= ?
//! ```
//! `rows_affected == 0` means the decrement did not happen - either the
//! product is gone/inactive or stock is short - and the caller's transaction
//! aborts as a whole. Stock can never go negative.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use orchard_core::Product;

const PRODUCT_COLUMNS: &str = "id, sku, name, description, image_url, category, price_cents, \
     stock, sold_count, is_active, created_at, updated_at, version";

/// Repository for product storage operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU (business key).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products, name-ordered.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists active products in a category, name-ordered.
    pub async fn list_by_category(&self, category: &str, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND category = ? ORDER BY name LIMIT ?"
        ))
        .bind(category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the SKU already exists.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            "INSERT INTO products (
                id, sku, name, description, image_url, category,
                price_cents, stock, sold_count, is_active,
                created_at, updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.sold_count)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates catalog fields of an existing product.
    ///
    /// Stock is deliberately not writable here; use [`restock`] or the
    /// checkout path's [`reserve_stock`].
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET
                sku = ?, name = ?, description = ?, image_url = ?, category = ?,
                price_cents = ?, is_active = ?, updated_at = ?, version = version + 1
             WHERE id = ?",
        )
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(now)
        .bind(&product.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Adds units back to stock (receiving inventory, cancelled orders).
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Restocking product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET
                stock = stock + ?, updated_at = ?, version = version + 1
             WHERE id = ?",
        )
        .bind(quantity)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product. Historical line items keep their snapshots.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?, version = version + 1
             WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics and seeding).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Atomically takes `quantity` units of stock, crediting `sold_count`.
///
/// Runs against a transaction connection so checkout can roll the decrement
/// back together with everything else. On failure the product row is probed
/// once more to tell "not enough stock" apart from "no such product".
pub async fn reserve_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        "UPDATE products SET
            stock = stock - ?,
            sold_count = sold_count + ?,
            updated_at = ?,
            version = version + 1
         WHERE id = ? AND is_active = 1 AND stock >= ?",
    )
    .bind(quantity)
    .bind(quantity)
    .bind(now)
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT sku, stock FROM products WHERE id = ? AND is_active = 1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        return Err(match row {
            Some((sku, available)) => DbError::InsufficientStock {
                sku,
                available,
                requested: quantity,
            },
            None => DbError::not_found("Product", product_id),
        });
    }

    debug!(product_id = %product_id, quantity = %quantity, "Stock reserved");
    Ok(())
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn test_product(sku: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            description: None,
            image_url: None,
            category: Some("apparel".to_string()),
            price_cents,
            stock,
            sold_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&product).await.unwrap();

        let fetched = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.sku, "TEE-BLK-M");
        assert_eq!(fetched.price_cents, 4999);
        assert_eq!(fetched.stock, 10);

        let by_sku = db.products().get_by_sku("TEE-BLK-M").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn duplicate_sku_is_rejected() {
        let db = db().await;
        db.products().insert(&test_product("MUG-12OZ", 1299, 5)).await.unwrap();

        let err = db
            .products()
            .insert(&test_product("MUG-12OZ", 999, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn reserve_stock_decrements_and_credits_sold() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        reserve_stock(&mut conn, &product.id, 4).await.unwrap();
        drop(conn);

        let fetched = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.stock, 6);
        assert_eq!(fetched.sold_count, 4);
    }

    #[tokio::test]
    async fn reserve_stock_refuses_to_oversell() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999, 3);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = reserve_stock(&mut conn, &product.id, 5).await.unwrap_err();
        drop(conn);

        match err {
            DbError::InsufficientStock {
                sku,
                available,
                requested,
            } => {
                assert_eq!(sku, "TEE-BLK-M");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing was taken
        let fetched = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.stock, 3);
        assert_eq!(fetched.sold_count, 0);
    }

    #[tokio::test]
    async fn reserve_stock_on_unknown_product_is_not_found() {
        let db = db().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = reserve_stock(&mut conn, "no-such-id", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn soft_delete_hides_from_listings() {
        let db = db().await;
        let product = test_product("TEE-BLK-M", 4999, 10);
        db.products().insert(&product).await.unwrap();

        assert_eq!(db.products().count().await.unwrap(), 1);
        db.products().soft_delete(&product.id).await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 0);
        assert!(db.products().list_active(10).await.unwrap().is_empty());
    }
}
