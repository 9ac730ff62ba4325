//! # Money Module
//!
//! Provides the `Money` type and the single place where fractional amounts
//! are rounded to cents.
//!
//! ## Accumulate Raw, Round Once
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE DOUBLE ROUNDING PROBLEM                                            │
//! │                                                                         │
//! │  Table time is billed in FRACTIONAL hours:                              │
//! │    37 min × 7.00/h = 4.31666...                                         │
//! │                                                                         │
//! │  Rounding every term before summing drifts:                             │
//! │    round(4.3166) + round(0.005) = 4.32 + 0.01 = 4.33   ❌              │
//! │    round(4.3166 + 0.005)                    = 4.32     ✅              │
//! │                                                                         │
//! │  OUR SOLUTION                                                           │
//! │    Inputs (prices, expenses)   → Money (integer cents)                  │
//! │    Intermediate sums           → f64, never rounded                     │
//! │    Emission to a caller        → Money::round_from_decimal (ONCE)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tabletime_core::money::Money;
//!
//! let hourly = Money::from_major(10);          // 10.00
//! let raw = 1.5 * hourly.to_decimal();         // 15.0 (unrounded)
//! assert_eq!(Money::round_from_decimal(raw), Money::from_cents(1500));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Table.current_hourly_price ──► TableSession.hourly_price (frozen)      │
/// │                                        │                                │
/// │  Product.price ──► SessionProductLine.unit_price (frozen)               │
/// │                                        │                                │
/// │                                        ▼                                │
/// │                        billing (f64, unrounded)                         │
/// │                                        │                                │
/// │                                        ▼                                │
/// │              CostBreakdown / ReportViewModel (Money, rounded)           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tabletime_core::money::Money;
    ///
    /// let price = Money::from_cents(450); // 4.50
    /// assert_eq!(price.cents(), 450);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Rounds a decimal amount to the nearest cent, half away from zero.
    ///
    /// This is the only rounding point in the crate. Non-finite input
    /// (NaN, infinities) yields zero.
    ///
    /// ```rust
    /// use tabletime_core::money::Money;
    ///
    /// assert_eq!(Money::round_from_decimal(4.316666).cents(), 432);
    /// assert_eq!(Money::round_from_decimal(0.125).cents(), 13);
    /// assert_eq!(Money::round_from_decimal(-0.125).cents(), -13);
    /// ```
    pub fn round_from_decimal(amount: f64) -> Self {
        if !amount.is_finite() {
            return Money::zero();
        }
        Money((amount * 100.0).round() as i64)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value in currency units as a float.
    ///
    /// Used to feed the unrounded billing arithmetic.
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns zero for negative amounts, the amount otherwise.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows two decimals without a currency symbol; the host adds its own.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        f.pad(&format!("{}{}.{:02}", sign, abs / 100, abs % 100))
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

/// Multiplication by a line quantity.
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

// =============================================================================
// Unit Tests
// =============================================================================
