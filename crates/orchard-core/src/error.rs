//! # Error Types
//!
//! Domain-specific error types for orchard-core.
//!
//! ## Error Hierarchy
//! ```text
//! orchard-core errors (this file)
//! ├── CoreError        - business rule violations
//! ├── CouponError      - coupon evaluation failures
//! └── ValidationError  - input validation failures
//!
//! orchard-db errors (separate crate)
//! └── DbError          - storage operation failures
//!
//! orchard-store errors (separate crate)
//! └── StoreError       - what the storefront client sees (serialized)
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations and domain logic failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Requested more units than are available. Raised by the conditional
    /// stock decrement during checkout, never by a blind read-then-write.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("Cart not found: {0}")]
    CartNotFound(String),

    #[error("Product {product_id} is not in the cart")]
    ItemNotInCart { product_id: String },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Checkout requires at least one line item.
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Review submission against an ineligible or already-reviewed line.
    #[error("Order item {order_item_id} is not eligible for review")]
    ReviewNotAllowed { order_item_id: String },

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Coupon Error
// =============================================================================

/// Coupon evaluation failures.
///
/// Each variant maps to a distinct storefront message; a failed evaluation
/// never changes the cart's stored discount.
#[derive(Debug, Error)]
pub enum CouponError {
    /// No active coupon matches the code.
    #[error("Coupon code '{0}' is not valid")]
    Invalid(String),

    /// Outside the validity window (not yet started, or expired).
    #[error("Coupon code '{0}' has expired or is not yet active")]
    Expired(String),

    /// Subtotal below the coupon's minimum order amount.
    #[error("Coupon '{code}' requires a minimum order of {required_cents} cents (subtotal {subtotal_cents})")]
    MinimumNotMet {
        code: String,
        required_cents: i64,
        subtotal_cents: i64,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            sku: "TEE-BLK-M".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for TEE-BLK-M: available 3, requested 5"
        );
    }

    #[test]
    fn coupon_errors_keep_their_code() {
        let err = CouponError::Expired("SPRING10".to_string());
        assert!(err.to_string().contains("SPRING10"));

        let err = CouponError::MinimumNotMet {
            code: "BIG25".to_string(),
            required_cents: 5000,
            subtotal_cents: 1200,
        };
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn coupon_error_converts_to_core_error() {
        let err: CoreError = CouponError::Invalid("NOPE".to_string()).into();
        assert!(matches!(err, CoreError::Coupon(_)));
    }

    #[test]
    fn validation_error_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "sku".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
