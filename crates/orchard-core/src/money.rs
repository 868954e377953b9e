//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! In floating point:   0.1 + 0.2 = 0.30000000000000004
//! In integer cents:    10 + 20   = 30
//! ```
//! Every monetary value in the system is carried in the smallest currency
//! unit. Line totals, taxes, shipping, discounts, and order totals all flow
//! through this type; only the storefront UI converts to dollars for display.
//!
//! ## Usage
//! ```rust
//! use orchard_core::money::Money;
//!
//! let price = Money::from_cents(4999); // $49.99
//! let line_total = price.times(2);     // $99.98
//! let tax = line_total.percent_bps(1000); // 10% -> $10.00 (rounded)
//! assert_eq!(tax.cents(), 1000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in the smallest currency unit (cents for USD).
///
/// Signed so that adjustments and refunds can be expressed, though cart and
/// order totals are kept non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use orchard_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two values. Used to cap discounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Subtraction that floors at zero instead of going negative.
    #[inline]
    pub const fn saturating_sub(self, other: Money) -> Money {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Multiplies by a quantity, for line totals.
    ///
    /// ```rust
    /// use orchard_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(5000); // $50.00
    /// assert_eq!(unit_price.times(2).cents(), 10000); // $100.00
    /// ```
    #[inline]
    pub const fn times(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Takes a basis-point fraction of this amount, rounding half-up.
    ///
    /// 1 basis point = 0.01%, so 1000 bps = 10%. One formula serves both tax
    /// and percentage coupons, so every caller rounds the same way.
    ///
    /// Implementation: `(amount * bps + 5000) / 10000` in i128 to prevent
    /// overflow on large amounts.
    ///
    /// ```rust
    /// use orchard_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(10000); // $100.00
    /// assert_eq!(subtotal.percent_bps(1000).cents(), 1000); // 10% = $10.00
    /// assert_eq!(Money::from_cents(999).percent_bps(1000).cents(), 100); // $0.999 -> $1.00
    /// ```
    pub fn percent_bps(&self, bps: u32) -> Money {
        let part = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money::from_cents(part as i64)
    }
}

/// Debug-friendly display. The storefront formats for locale itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Summing line totals into a subtotal.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}
