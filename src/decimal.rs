use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};
use std::str::FromStr;

/// decimal places carried by currency amounts once rounded
pub const CURRENCY_DP: u32 = 2;

/// internal precision kept between operations
const INTERNAL_DP: u32 = 8;

/// Money type; intermediate values keep 8 places, settled amounts are rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);
    pub const CENT: Money = Money(Decimal::from_parts(1, 0, 0, false, 2));

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(INTERNAL_DP))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s)?.round_dp(INTERNAL_DP)))
    }

    /// create from integer amount (dollars, soles, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor amount (cents)
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, CURRENCY_DP))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// round half-up to cents
    pub fn round_currency(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// truncate to cents, never rounding up
    pub fn floor_currency(&self) -> Self {
        Money(self.0.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::ToZero))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<i32> for Money {
    fn from(i: i32) -> Self {
        Money::from_major(i as i64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(INTERNAL_DP))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(INTERNAL_DP);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money((self.0 - other.0).round_dp(INTERNAL_DP))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 = (self.0 - other.0).round_dp(INTERNAL_DP);
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;

    fn mul(self, other: Decimal) -> Money {
        Money((self.0 * other).round_dp(INTERNAL_DP))
    }
}

impl Div<Decimal> for Money {
    type Output = Money;

    fn div(self, other: Decimal) -> Money {
        Money((self.0 / other).round_dp(INTERNAL_DP))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

/// annual interest rate, always held as a fraction (0.0315 for 3.15%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from fraction (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from percentage (e.g., 3.15 for 3.15%)
    pub fn from_percentage(p: Decimal) -> Self {
        Rate(p / Decimal::ONE_HUNDRED)
    }

    /// create from basis points (e.g., 315 for 3.15%)
    pub fn from_bps(bps: u32) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(10000))
    }

    /// Converts a rate quoted by an outside caller. Anything above 1 is read
    /// as a percentage, anything else as a fraction.
    pub fn from_quoted(value: Decimal) -> Self {
        if value > Decimal::ONE {
            Rate::from_percentage(value)
        } else {
            Rate(value)
        }
    }

    /// get as fraction
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// get as percentage
    pub fn as_percentage(&self) -> Decimal {
        (self.0 * Decimal::ONE_HUNDRED).normalize()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_precision() {
        let m = Money::from_str_exact("100.123456789").unwrap();
        assert_eq!(m.to_string(), "100.12345679");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(Money::from_decimal(dec!(7.965)).round_currency(), Money::from_decimal(dec!(7.97)));
        assert_eq!(Money::from_decimal(dec!(7.9625)).round_currency(), Money::from_decimal(dec!(7.96)));
        assert_eq!(Money::from_decimal(dec!(0.005)).round_currency(), Money::CENT);
        assert_eq!(Money::from_decimal(dec!(0.009)).floor_currency(), Money::ZERO);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(Money::from_minor(100_050), Money::from_decimal(dec!(1000.50)));
        assert_eq!(Money::from_minor(1), Money::CENT);
    }

    #[test]
    fn test_quoted_rate_normalization() {
        let percent = Rate::from_quoted(dec!(2.65));
        let fraction = Rate::from_quoted(dec!(0.0265));
        assert_eq!(percent.as_decimal(), dec!(0.0265));
        assert_eq!(percent, fraction);
        assert_eq!(percent.to_string(), "2.65%");
        // exactly 1 is a fraction, i.e. 100%
        assert_eq!(Rate::from_quoted(Decimal::ONE), Rate::ONE);
    }

    #[test]
    fn test_money_sum() {
        let parts = vec![Money::from_minor(333), Money::from_minor(333), Money::from_minor(334)];
        let total: Money = parts.iter().sum();
        assert_eq!(total, Money::from_major(10));
    }
}
