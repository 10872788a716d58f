use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Sub};
use std::str::FromStr;

/// Money type with 8 decimal places precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s)?.round_dp(8)))
    }

    /// create from integer amount (rupiah, dollars, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// calculate percentage (e.g., 10% of 5,000,000)
    pub fn percentage(&self, rate: Decimal) -> Self {
        Money((self.0 * rate / Decimal::from(100)).round_dp(8))
    }

    /// true when the two amounts differ by no more than `tolerance`
    pub fn approx_eq(&self, other: Money, tolerance: Decimal) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(8))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(8))
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, other: Decimal) -> Money {
        Money((self.0 / other).round_dp(8))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, x| acc + *x)
    }
}

/// rate type for flat loan interest, stored as a fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    /// create from whole percentage (e.g., 10 for 10%)
    pub fn from_percentage(p: u32) -> Self {
        Rate(Decimal::from(p) / Decimal::from(100))
    }

    /// create from fractional percentage (e.g., 12.5 for 12.5%)
    pub fn from_percentage_decimal(p: Decimal) -> Self {
        Rate(p / Decimal::from(100))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// flat loan rates must lie within 0%..=100%
    pub fn is_valid_flat_rate(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_precision() {
        let m = Money::from_str_exact("100.123456789").unwrap();
        assert_eq!(m.to_string(), "100.12345679"); // rounded to 8 places
    }

    #[test]
    fn test_flat_interest() {
        let principal = Money::from_major(5_000_000);
        let rate = Rate::from_percentage(10);

        let interest = principal.percentage(rate.as_percentage());
        assert_eq!(interest, Money::from_major(500_000));
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let a = Money::from_str_exact("110000.000001").unwrap();
        let b = Money::from_major(110_000);

        assert!(a.approx_eq(b, dec!(0.00001)));
        assert!(!a.approx_eq(Money::from_major(100_000), dec!(0.00001)));
    }

    #[test]
    fn test_sum_of_thirds_drifts_within_tolerance() {
        let total = Money::from_major(1_000);
        let third = total / Decimal::from(3);
        let sum: Money = vec![third, third, third].into_iter().sum();

        assert_ne!(sum, total);
        assert!(sum.approx_eq(total, dec!(0.00001)));
    }

    #[test]
    fn test_rate_bounds() {
        assert!(Rate::from_percentage(0).is_valid_flat_rate());
        assert!(Rate::from_percentage(100).is_valid_flat_rate());
        assert!(!Rate::from_percentage(101).is_valid_flat_rate());
        assert!(!Rate::from_percentage_decimal(dec!(-1)).is_valid_flat_rate());
        assert_eq!(Rate::from_percentage_decimal(dec!(12.5)).as_decimal(), dec!(0.125));
    }
}
