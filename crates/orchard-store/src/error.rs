//! # Store Error Type
//!
//! Unified error type for storefront operations.
//!
//! ## Serialization
//! This is what the storefront client receives when an operation fails:
//! ```json
//! {
//!   "code": "EXPIRED_COUPON",
//!   "message": "Coupon code 'LASTYEAR20' has expired or is not yet active"
//! }
//! ```
//! The `code` drives programmatic handling (which notification to show,
//! whether to retry); the `message` is for display.

use serde::Serialize;

use orchard_core::{CoreError, CouponError, ValidationError};
use orchard_db::DbError;

/// Error returned from storefront operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreError {
    /// Machine-readable error code for programmatic handling.
    pub code: ErrorCode,

    /// Human-readable error message for display.
    pub message: String,
}

/// Error codes for storefront responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Storage operation failed
    DatabaseError,

    /// A concurrent write won; re-read and retry
    Conflict,

    /// Not enough stock to fulfill the request
    InsufficientStock,

    /// Coupon code does not exist or is deactivated
    InvalidCoupon,

    /// Coupon is outside its validity window
    ExpiredCoupon,

    /// Cart subtotal below the coupon's minimum order
    MinimumNotMet,

    /// Checkout attempted on an empty cart
    EmptyCart,

    /// Cart rule violation (size, quantity, missing line)
    CartError,

    /// Review submission/moderation rejected
    ReviewError,

    /// Internal error
    Internal,
}

impl StoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        StoreError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        StoreError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StoreError::new(ErrorCode::Internal, message)
    }
}

/// Converts storage errors to store errors.
impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::not_found(&entity, &id),
            DbError::VersionConflict { entity, .. } => StoreError::new(
                ErrorCode::Conflict,
                format!("{} was modified concurrently, please retry", entity),
            ),
            DbError::InsufficientStock {
                sku,
                available,
                requested,
            } => StoreError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    sku, available, requested
                ),
            ),
            DbError::UniqueViolation { field, .. } => StoreError::new(
                ErrorCode::ValidationError,
                format!("Duplicate value for {}", field),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                StoreError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(_) => {
                StoreError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                StoreError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                StoreError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                StoreError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                StoreError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts coupon evaluation errors to store errors. Each variant keeps its
/// own code so the storefront can message them apart.
impl From<CouponError> for StoreError {
    fn from(err: CouponError) -> Self {
        let code = match &err {
            CouponError::Invalid(_) => ErrorCode::InvalidCoupon,
            CouponError::Expired(_) => ErrorCode::ExpiredCoupon,
            CouponError::MinimumNotMet { .. } => ErrorCode::MinimumNotMet,
        };
        StoreError::new(code, err.to_string())
    }
}

/// Converts domain errors to store errors.
impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => StoreError::not_found("Product", &id),
            CoreError::CartNotFound(id) => StoreError::not_found("Cart", &id),
            CoreError::OrderNotFound(id) => StoreError::not_found("Order", &id),
            CoreError::InsufficientStock {
                sku,
                available,
                requested,
            } => StoreError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    sku, available, requested
                ),
            ),
            CoreError::EmptyCart => StoreError::new(ErrorCode::EmptyCart, "Cart is empty"),
            CoreError::ItemNotInCart { product_id } => StoreError::new(
                ErrorCode::CartError,
                format!("Product {} is not in the cart", product_id),
            ),
            CoreError::CartTooLarge { max } => StoreError::new(
                ErrorCode::CartError,
                format!("Cart cannot have more than {} items", max),
            ),
            CoreError::QuantityTooLarge { requested, max } => StoreError::new(
                ErrorCode::ValidationError,
                format!("Quantity {} exceeds maximum allowed ({})", requested, max),
            ),
            CoreError::ReviewNotAllowed { order_item_id } => StoreError::new(
                ErrorCode::ReviewError,
                format!("Order item {} is not eligible for review", order_item_id),
            ),
            CoreError::Coupon(e) => e.into(),
            CoreError::Validation(e) => StoreError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Serialization failed: {}", err);
        StoreError::internal("Serialization failed")
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {}
