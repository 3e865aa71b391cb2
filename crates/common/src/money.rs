use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Prices are currency-scale decimals with two fractional digits; internally
/// they are held as an integer number of minor units, which is also what the
/// payment provider expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Number of fractional digits carried by every amount.
    pub const SCALE: u32 = 2;

    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Converts a decimal amount such as `10.50` into money.
    ///
    /// Returns `None` when the value has more than two fractional digits or
    /// does not fit in the minor-unit range.
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let scaled = amount.checked_mul(Decimal::ONE_HUNDRED)?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.to_i64().map(Self::from_cents)
    }

    /// Returns the amount as a decimal with a fixed scale of two.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, Self::SCALE)
    }

    /// Returns the amount in cents (minor units).
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.cents.checked_mul(i64::from(quantity)).map(Self::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Self::from_cents)
    }

    /// Sums `amounts`, or `None` if the total overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.to_string(), "12.34");
    }

    #[test]
    fn test_from_decimal_accepts_currency_scale() {
        let money = Money::from_decimal(Decimal::from_str("10.50").unwrap()).unwrap();
        assert_eq!(money.cents(), 1050);

        let whole = Money::from_decimal(Decimal::from(7)).unwrap();
        assert_eq!(whole.cents(), 700);
    }

    #[test]
    fn test_from_decimal_rejects_sub_cent_precision() {
        assert!(Money::from_decimal(Decimal::from_str("0.005").unwrap()).is_none());
    }

    #[test]
    fn test_to_decimal_keeps_two_places() {
        assert_eq!(Money::from_cents(2500).to_decimal().to_string(), "25.00");
        assert_eq!(Money::from_cents(5).to_decimal().to_string(), "0.05");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!(a.checked_add(b), Some(Money::from_cents(1500)));
        assert_eq!(a.checked_mul(3), Some(Money::from_cents(3000)));
    }

    #[test]
    fn test_money_sum() {
        let total = Money::checked_sum([Money::from_cents(2000), Money::from_cents(500)]);
        assert_eq!(total, Some(Money::from_cents(2500)));
        assert_eq!(Money::checked_sum(Vec::new()), Some(Money::zero()));
    }

    #[test]
    fn test_arithmetic_overflow_is_none() {
        let huge = Money::from_cents(10_000_000_000);
        assert_eq!(huge.checked_mul(1_000_000_000), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]),
            None
        );
    }

    #[test]
    fn test_money_sign_checks() {
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(0).is_zero());
        assert!(Money::from_cents(-100).is_negative());
    }
}
