//! # Review Service
//!
//! Review submission (purchasers only, one per order line) and moderation.
//! Only approved reviews reach the storefront.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use orchard_core::{validation, CoreError, Review, ReviewStatus, ValidationError};
use orchard_db::Database;

use crate::error::StoreError;

/// Maximum review body length, in characters.
const MAX_REVIEW_BODY: usize = 2000;

/// Review operations.
#[derive(Debug, Clone)]
pub struct ReviewService {
    db: Database,
}

impl ReviewService {
    pub fn new(db: Database) -> Self {
        ReviewService { db }
    }

    /// Submits a review for a purchased order line.
    ///
    /// The line must belong to one of the customer's orders, be
    /// review-eligible, and not have a review yet. Created as `pending`.
    pub async fn submit(
        &self,
        customer_id: &str,
        order_item_id: &str,
        rating: i64,
        body: &str,
    ) -> Result<Review, StoreError> {
        debug!(customer_id = %customer_id, order_item_id = %order_item_id, rating, "submit review");

        validation::validate_customer_id(customer_id)?;
        validation::validate_rating(rating)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ValidationError::Required {
                field: "body".to_string(),
            }
            .into());
        }
        if body.len() > MAX_REVIEW_BODY {
            return Err(ValidationError::TooLong {
                field: "body".to_string(),
                max: MAX_REVIEW_BODY,
            }
            .into());
        }

        let item = self
            .db
            .reviews()
            .purchased_item(order_item_id, customer_id)
            .await?
            .filter(|i| i.review_eligible)
            .ok_or_else(|| CoreError::ReviewNotAllowed {
                order_item_id: order_item_id.to_string(),
            })?;

        let review = Review {
            id: Uuid::new_v4().to_string(),
            product_id: item.product_id.clone(),
            order_item_id: order_item_id.to_string(),
            customer_id: customer_id.to_string(),
            rating,
            body: body.to_string(),
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
        };

        match self.db.reviews().insert(&review).await {
            Ok(()) => {
                info!(review_id = %review.id, product_id = %review.product_id, "Review submitted");
                Ok(review)
            }
            Err(e) if e.is_unique_violation_on("order_item_id") => {
                Err(CoreError::ReviewNotAllowed {
                    order_item_id: order_item_id.to_string(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Moderates a pending review: approve or reject.
    pub async fn moderate(&self, review_id: &str, approve: bool) -> Result<(), StoreError> {
        let status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };

        self.db.reviews().set_status(review_id, status).await?;
        info!(review_id = %review_id, ?status, "Review moderated");
        Ok(())
    }

    /// Approved reviews for a product page.
    pub async fn for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> Result<Vec<Review>, StoreError> {
        Ok(self
            .db
            .reviews()
            .list_approved_for_product(product_id, limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_core::{Address, CheckoutPolicy, Product};
    use orchard_db::DbConfig;

    use crate::cart::CartService;
    use crate::checkout::{CheckoutRequest, CheckoutService, OrderReceipt};
    use crate::error::ErrorCode;

    struct Fixture {
        reviews: ReviewService,
        db: Database,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Fixture {
            reviews: ReviewService::new(db.clone()),
            db,
        }
    }

    /// Seeds a product and walks cust-1 through buying it.
    async fn purchase(fx: &Fixture) -> (Product, OrderReceipt) {
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
        fx.db.products().insert(&product).await.unwrap();

        let policy = CheckoutPolicy::default();
        let carts = CartService::new(fx.db.clone(), policy);
        let checkout = CheckoutService::new(fx.db.clone(), policy);

        carts.add_item("cust-1", &product.id, 1).await.unwrap();
        let receipt = checkout
            .place_order(
                "cust-1",
                CheckoutRequest {
                    shipping_address: Address {
                        recipient: "Ada Lovelace".to_string(),
                        line1: "12 Analytical Way".to_string(),
                        line2: None,
                        city: "London".to_string(),
                        region: "LDN".to_string(),
                        postal_code: "EC1A 1AA".to_string(),
                        country: "GB".to_string(),
                        phone: None,
                    },
                    billing_address: None,
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();

        (product, receipt)
    }

    #[tokio::test]
    async fn submit_then_approve_then_listed() {
        let fx = fixture().await;
        let (product, receipt) = purchase(&fx).await;
        let line_id = &receipt.items[0].id;

        let review = fx
            .reviews
            .submit("cust-1", line_id, 5, "Fits great, held up in the wash")
            .await
            .unwrap();
        assert_eq!(review.status, ReviewStatus::Pending);

        // Invisible until approved
        assert!(fx.reviews.for_product(&product.id, 10).await.unwrap().is_empty());

        fx.reviews.moderate(&review.id, true).await.unwrap();
        let listed = fx.reviews.for_product(&product.id, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].rating, 5);
    }

    #[tokio::test]
    async fn rejected_reviews_stay_hidden() {
        let fx = fixture().await;
        let (product, receipt) = purchase(&fx).await;

        let review = fx
            .reviews
            .submit("cust-1", &receipt.items[0].id, 1, "Shrunk immediately")
            .await
            .unwrap();
        fx.reviews.moderate(&review.id, false).await.unwrap();

        assert!(fx.reviews.for_product(&product.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_purchaser_may_review() {
        let fx = fixture().await;
        let (_product, receipt) = purchase(&fx).await;

        let err = fx
            .reviews
            .submit("cust-2", &receipt.items[0].id, 4, "Looks nice")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReviewError);
    }

    #[tokio::test]
    async fn one_review_per_line() {
        let fx = fixture().await;
        let (_product, receipt) = purchase(&fx).await;
        let line_id = &receipt.items[0].id;

        fx.reviews
            .submit("cust-1", line_id, 5, "Fits great")
            .await
            .unwrap();
        let err = fx
            .reviews
            .submit("cust-1", line_id, 4, "Second thoughts")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReviewError);
    }

    #[tokio::test]
    async fn rating_and_body_are_validated() {
        let fx = fixture().await;
        let (_product, receipt) = purchase(&fx).await;
        let line_id = &receipt.items[0].id;

        let err = fx.reviews.submit("cust-1", line_id, 6, "!!").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = fx.reviews.submit("cust-1", line_id, 4, "   ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
