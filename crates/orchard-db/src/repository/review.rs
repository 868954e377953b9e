//! # Review Repository
//!
//! Review storage and the moderation state transition. Eligibility rules
//! (purchaser owns the line, line is review-eligible, one review per line)
//! are enforced by the service layer plus the UNIQUE(order_item_id)
//! constraint.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use orchard_core::{OrderLineItem, Review, ReviewStatus};

const REVIEW_COLUMNS: &str =
    "id, product_id, order_item_id, customer_id, rating, body, status, created_at";

/// Repository for review storage operations.
#[derive(Debug, Clone)]
pub struct ReviewRepository {
    pool: SqlitePool,
}

impl ReviewRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReviewRepository { pool }
    }

    /// Inserts a new review (created as `pending`).
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the order item already has a review.
    pub async fn insert(&self, review: &Review) -> DbResult<()> {
        debug!(product_id = %review.product_id, order_item_id = %review.order_item_id, "Inserting review");

        sqlx::query(
            "INSERT INTO reviews (
                id, product_id, order_item_id, customer_id,
                rating, body, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(&review.product_id)
        .bind(&review.order_item_id)
        .bind(&review.customer_id)
        .bind(review.rating)
        .bind(&review.body)
        .bind(review.status)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a review by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    /// Finds an order line item that belongs to one of the customer's own
    /// orders. Returns None when the line doesn't exist or belongs to
    /// someone else.
    pub async fn purchased_item(
        &self,
        order_item_id: &str,
        customer_id: &str,
    ) -> DbResult<Option<OrderLineItem>> {
        let item = sqlx::query_as::<_, OrderLineItem>(
            "SELECT oi.id, oi.order_id, oi.product_id, oi.sku_snapshot, oi.name_snapshot, \
                    oi.image_snapshot, oi.unit_price_cents, oi.quantity, oi.line_total_cents, \
                    oi.review_eligible, oi.created_at
             FROM order_items oi
             INNER JOIN orders o ON o.id = oi.order_id
             WHERE oi.id = ? AND o.customer_id = ?",
        )
        .bind(order_item_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Moderation transition: pending → approved/rejected.
    ///
    /// ## Errors
    /// `DbError::NotFound` when the review doesn't exist or was already
    /// moderated.
    pub async fn set_status(&self, review_id: &str, status: ReviewStatus) -> DbResult<()> {
        debug!(review_id = %review_id, ?status, "Moderating review");

        let result = sqlx::query(
            "UPDATE reviews SET status = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(status)
        .bind(review_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Review (pending)", review_id));
        }

        Ok(())
    }

    /// Lists approved reviews for a product, newest first. Pending and
    /// rejected reviews never reach the storefront.
    pub async fn list_approved_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews \
             WHERE product_id = ? AND status = 'approved' \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use orchard_core::{Address, CartLineItem, Order, OrderStatus, Product};
    use uuid::Uuid;

    async fn db_with_order() -> (Database, Product, Order, Vec<OrderLineItem>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: "TEE-BLK-M".to_string(),
            name: "Black Tee (M)".to_string(),
            description: None,
            image_url: None,
            category: None,
            price_cents: 4999,
            stock: 10,
            sold_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        db.products().insert(&product).await.unwrap();

        let cart = db.carts().get_or_create("cust-1").await.unwrap();
        let line = CartLineItem::snapshot(&cart.id, &product, 1);
        db.carts().insert_item(&line).await.unwrap();

        let order_id = Uuid::new_v4().to_string();
        let items = vec![OrderLineItem::materialize(&order_id, &line, now)];
        let address = Address {
            recipient: "Ada Lovelace".to_string(),
            line1: "12 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            region: "LDN".to_string(),
            postal_code: "EC1A 1AA".to_string(),
            country: "GB".to_string(),
            phone: None,
        };
        let order = Order {
            id: order_id,
            customer_id: "cust-1".to_string(),
            status: OrderStatus::Placed,
            subtotal_cents: 4999,
            tax_cents: 500,
            shipping_cents: 1000,
            discount_cents: 0,
            total_cents: 6499,
            coupon_code: None,
            item_count: 1,
            shipping_address_json: serde_json::to_string(&address).unwrap(),
            billing_address_json: None,
            idempotency_key: Uuid::new_v4().to_string(),
            placed_at: now,
        };
        db.orders()
            .place(&order, &items, &cart.id, cart.version)
            .await
            .unwrap();

        (db, product, order, items)
    }

    fn review_for(product_id: &str, order_item_id: &str) -> Review {
        Review {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            order_item_id: order_item_id.to_string(),
            customer_id: "cust-1".to_string(),
            rating: 5,
            body: "Fits great".to_string(),
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn purchased_item_checks_ownership() {
        let (db, _product, _order, items) = db_with_order().await;

        let mine = db
            .reviews()
            .purchased_item(&items[0].id, "cust-1")
            .await
            .unwrap();
        assert!(mine.is_some());

        let someone_elses = db
            .reviews()
            .purchased_item(&items[0].id, "cust-2")
            .await
            .unwrap();
        assert!(someone_elses.is_none());
    }

    #[tokio::test]
    async fn one_review_per_order_item() {
        let (db, product, _order, items) = db_with_order().await;

        db.reviews()
            .insert(&review_for(&product.id, &items[0].id))
            .await
            .unwrap();
        let err = db
            .reviews()
            .insert(&review_for(&product.id, &items[0].id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn moderation_gates_the_storefront_list() {
        let (db, product, _order, items) = db_with_order().await;

        let review = review_for(&product.id, &items[0].id);
        db.reviews().insert(&review).await.unwrap();

        // Pending reviews are invisible
        assert!(db
            .reviews()
            .list_approved_for_product(&product.id, 10)
            .await
            .unwrap()
            .is_empty());

        db.reviews()
            .set_status(&review.id, ReviewStatus::Approved)
            .await
            .unwrap();
        let listed = db
            .reviews()
            .list_approved_for_product(&product.id, 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].rating, 5);

        // Moderation is one-shot
        let err = db
            .reviews()
            .set_status(&review.id, ReviewStatus::Rejected)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
