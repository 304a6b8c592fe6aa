//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Callers speak MAJOR units:   amount = 5000      (₦5,000.00)            │
//! │  We store MINOR units:       Money(500_000)     (kobo / cents)         │
//! │  Providers differ:                                                      │
//! │    Paystack    → minor units on the wire                                │
//! │    Flutterwave → major units on the wire                                │
//! │                                                                         │
//! │  Conversion happens exactly once, at the edge, through Decimal.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookpay_core::money::Money;
//!
//! let price = Money::from_minor(500_000); // 5000.00
//! assert_eq!(price.major(), 5000);
//! assert_eq!(price.to_string(), "5000.00");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::error::{CoreError, CoreResult};
use crate::types::FeeRate;

/// Number of minor units in one major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for net amounts and refunds
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No float constructor**: major-unit input goes through [`Decimal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from a whole number of major units.
    ///
    /// ```rust
    /// use bookpay_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(500).minor(), 50_000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Converts a major-unit decimal (as received over the API) into Money.
    ///
    /// ## Rules
    /// - At most two fractional digits (`49.999` is rejected, not rounded)
    /// - Must fit in i64 minor units
    ///
    /// ```rust
    /// use bookpay_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let amount = Money::from_major_decimal(Decimal::new(4999, 2)).unwrap(); // 49.99
    /// assert_eq!(amount.minor(), 4999);
    /// ```
    pub fn from_major_decimal(value: Decimal) -> CoreResult<Self> {
        let scaled = value * Decimal::from(MINOR_PER_MAJOR);
        if scaled.fract() != Decimal::ZERO {
            return Err(CoreError::InvalidAmount {
                reason: format!("{value} has more than two decimal places"),
            });
        }
        scaled
            .trunc()
            .to_i64()
            .map(Money)
            .ok_or_else(|| CoreError::InvalidAmount {
                reason: format!("{value} is out of range"),
            })
    }

    /// Returns the value as a major-unit decimal (for providers that want it).
    pub fn to_major_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor-unit remainder (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

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

    /// Applies a basis-point rate, rounding half up on the minor unit.
    ///
    /// ```rust
    /// use bookpay_core::money::Money;
    /// use bookpay_core::types::FeeRate;
    ///
    /// let amount = Money::from_major(1000);
    /// assert_eq!(amount.apply_rate(FeeRate::from_bps(300)), Money::from_major(30));
    /// ```
    pub fn apply_rate(&self, rate: FeeRate) -> Money {
        // i128 keeps large amounts from overflowing before the division
        let minor = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(minor as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
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

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_major_and_parts() {
        let money = Money::from_minor(1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
        assert_eq!(Money::from_major(5000).minor(), 500_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_major(500).to_string(), "500.00");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_from_major_decimal_exact() {
        let whole = Money::from_major_decimal(Decimal::from(5000)).unwrap();
        assert_eq!(whole.minor(), 500_000);

        let cents = Money::from_major_decimal(Decimal::from_str("49.90").unwrap()).unwrap();
        assert_eq!(cents.minor(), 4990);
    }

    #[test]
    fn test_from_major_decimal_rejects_sub_minor_precision() {
        let err = Money::from_major_decimal(Decimal::from_str("10.005").unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_to_major_decimal() {
        assert_eq!(
            Money::from_minor(4990).to_major_decimal(),
            Decimal::from_str("49.90").unwrap()
        );
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        // 3% of 0.50 = 0.015 → 0.02
        assert_eq!(Money::from_minor(50).apply_rate(FeeRate::from_bps(300)).minor(), 2);
        // 3% of 20000.00 = 600.00
        assert_eq!(
            Money::from_major(20000).apply_rate(FeeRate::from_bps(300)),
            Money::from_major(600)
        );
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(300);
        assert_eq!((a - b).minor(), 700);
        assert_eq!((a + b).minor(), 1300);

        let mut c = a;
        c -= b;
        c += Money::from_minor(1);
        assert_eq!(c.minor(), 701);
    }
}
