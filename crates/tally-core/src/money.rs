//! # Money Module
//!
//! Provides the `Money` type used for every amount the register touches:
//! catalog prices, session subtotals, incoming mobile payments, cash entries
//! and change.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RECONCILIATION NEEDS EXACT SUMS                                        │
//! │                                                                         │
//! │  Floating point:                                                        │
//! │    5.00 + 3.10 = 8.100000000000001 → "remaining 0.0000000001"  ❌       │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    500 + 310 = 810 → remaining 0 → covered                      ✅      │
//! │                                                                         │
//! │  The only rounding left is the tax step, and it happens exactly once.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(250); // $2.50
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 750);
//! assert_eq!(line.to_string(), "$7.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed, so a reconciliation `remaining` can go negative when a customer
/// overpays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1015).cents(), 1015);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole units and cents.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-1, 90)` is -$1.90.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion (truncated toward zero).
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion, always 0-99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
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

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Adds without overflowing, clamping at the `i64` bounds.
    #[inline]
    pub const fn saturating_add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }

    /// Clamps negative values to zero.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-190).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(190).non_negative().cents(), 190);
    /// ```
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Calculates tax at the given rate, rounding half up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, computed in i128 so
    /// large subtotals cannot overflow.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(750);
    /// let tax = subtotal.calculate_tax(TaxRate::from_bps(800));
    /// assert_eq!(tax.cents(), 60);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as `$X.YY`, used in cashier-facing messages such as
/// "still owed $3.10".
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_parts() {
        let money = Money::from_cents(1015);
        assert_eq!(money.cents(), 1015);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 15);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(8, 10).cents(), 810);
        assert_eq!(Money::from_major_minor(-1, 90).cents(), -190);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(810).to_string(), "$8.10");
        assert_eq!(Money::from_cents(-190).to_string(), "-$1.90");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(500);
        let b = Money::from_cents(310);
        assert_eq!((a + b).cents(), 810);
        assert_eq!((b - a).cents(), -190);
        assert_eq!((-a).cents(), -500);
        assert_eq!((a * 3).cents(), 1500);

        let entries = [a, b, Money::from_cents(1)];
        let total: Money = entries.iter().sum();
        assert_eq!(total.cents(), 811);
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // $7.50 at 8% = $0.60 exactly
        assert_eq!(
            Money::from_cents(750).calculate_tax(TaxRate::from_bps(800)).cents(),
            60
        );
        // $0.19 at 8% = 1.52 cents → 2 cents
        assert_eq!(
            Money::from_cents(19).calculate_tax(TaxRate::from_bps(800)).cents(),
            2
        );
        // $0.06 at 8% = 0.48 cents → 0 cents
        assert_eq!(
            Money::from_cents(6).calculate_tax(TaxRate::from_bps(800)).cents(),
            0
        );
    }

    #[test]
    fn test_non_negative() {
        assert!(Money::from_cents(-1).non_negative().is_zero());
        assert!(Money::from_cents(1).non_negative().is_positive());
    }
}
