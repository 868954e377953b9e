//! # Coupon Evaluation
//!
//! Pure evaluation of a coupon against a cart subtotal. Lookup lives in
//! `orchard-db`; persisting the result onto the cart lives in
//! `orchard-store`. This module only answers: given this coupon, this
//! subtotal, and this clock, what discount applies?
//!
//! ## Evaluation Order
//! ```text
//! discount_for(coupon, subtotal, now)
//!        │
//!        ├── inactive?              → Invalid
//!        ├── outside validity window → Expired
//!        ├── subtotal < minimum     → MinimumNotMet
//!        │
//!        ▼
//! Percentage: subtotal × bps, capped at max_discount, capped at subtotal
//! Fixed:      value cents, capped at subtotal
//! ```

use chrono::{DateTime, Utc};

use crate::error::CouponError;
use crate::money::Money;
use crate::types::{Coupon, CouponKind};

/// Evaluates a coupon against a subtotal at a point in time.
///
/// Returns the discount amount; never mutates anything, so a failing
/// evaluation cannot disturb whatever discount a cart already carries.
///
/// ## Errors
/// - [`CouponError::Invalid`] - coupon is deactivated
/// - [`CouponError::Expired`] - `now` is outside `[starts_at, expires_at]`
/// - [`CouponError::MinimumNotMet`] - subtotal below the coupon's minimum
pub fn discount_for(
    coupon: &Coupon,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<Money, CouponError> {
    if !coupon.is_active {
        return Err(CouponError::Invalid(coupon.code.clone()));
    }

    if now < coupon.starts_at || now > coupon.expires_at {
        return Err(CouponError::Expired(coupon.code.clone()));
    }

    if subtotal.cents() < coupon.min_order_cents {
        return Err(CouponError::MinimumNotMet {
            code: coupon.code.clone(),
            required_cents: coupon.min_order_cents,
            subtotal_cents: subtotal.cents(),
        });
    }

    let discount = match coupon.kind {
        CouponKind::Percentage => {
            let raw = subtotal.percent_bps(coupon.value as u32);
            match coupon.max_discount_cents {
                Some(cap) => raw.min(Money::from_cents(cap)),
                None => raw,
            }
        }
        CouponKind::Fixed => Money::from_cents(coupon.value),
    };

    // A coupon can never discount more than the goods cost.
    Ok(discount.min(subtotal))
}
