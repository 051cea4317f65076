use crate::currency::Currency;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// A decimal-exact amount paired with its currency.
///
/// Addition and subtraction require matching currencies; there is no
/// implicit conversion anywhere in this type — FX conversion is a valuation
/// engine's job (spec §4.8), not this type's.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {lhs} vs {rhs}")]
    CurrencyMismatch { lhs: Currency, rhs: Currency },
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<Currency>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// A zero amount in the given currency.
    pub fn zero(currency: impl Into<Currency>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn negate(&self) -> Self {
        Self {
            amount: -self.amount,
            currency: self.currency.clone(),
        }
    }

    /// Quantize to the currency's conventional scale using banker's rounding
    /// (round-half-to-even), matching spec §9's "quantize with banker's
    /// rounding" note.
    pub fn quantize(&self) -> Self {
        let scale = self.currency.default_scale();
        Self {
            amount: self
                .amount
                .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven),
            currency: self.currency.clone(),
        }
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn checked_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Scalar multiplication never fails: there is no currency to mismatch.
    pub fn scale(&self, factor: Decimal) -> Money {
        Money {
            amount: self.amount * factor,
            currency: self.currency.clone(),
        }
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                lhs: self.currency.clone(),
                rhs: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Sum a slice of same-currency `Money` values, starting from zero in the
/// given currency. Fails on the first mismatched currency encountered.
pub fn sum(currency: impl Into<Currency>, values: &[Money]) -> Result<Money, MoneyError> {
    let mut total = Money::zero(currency);
    for v in values {
        total = total.checked_add(v)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn add_same_currency() {
        let a = Money::new(d("10.50"), "USD");
        let b = Money::new(d("5.25"), "USD");
        assert_eq!(a.checked_add(&b).unwrap(), Money::new(d("15.75"), "USD"));
    }

    #[test]
    fn add_mismatched_currency_fails() {
        let a = Money::new(d("10.00"), "USD");
        let b = Money::new(d("10.00"), "EUR");
        assert!(matches!(
            a.checked_add(&b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn zero_is_zero() {
        assert!(Money::zero("USD").is_zero());
    }

    #[test]
    fn quantize_uses_banker_rounding() {
        let m = Money::new(d("1.005"), "USD");
        // 1.005 is exactly representable in decimal; midpoint rounds to even.
        assert_eq!(m.quantize().amount(), d("1.00"));
    }

    proptest! {
        #[test]
        fn negate_is_involutive(cents in -1_000_000i64..1_000_000) {
            let amount = Decimal::new(cents, 2);
            let m = Money::new(amount, "USD");
            prop_assert_eq!(m.negate().negate(), m);
        }

        #[test]
        fn add_then_sub_roundtrips(a_cents in -1_000_000i64..1_000_000, b_cents in -1_000_000i64..1_000_000) {
            let a = Money::new(Decimal::new(a_cents, 2), "USD");
            let b = Money::new(Decimal::new(b_cents, 2), "USD");
            let sum = a.checked_add(&b).unwrap();
            prop_assert_eq!(sum.checked_sub(&b).unwrap(), a);
        }
    }
}
