use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A decimal-exact quantity tagged with a unit (e.g. `"kg"`, `"hours"`,
/// `"each"`). Mirrors `Money`'s currency discipline: arithmetic across
/// mismatched units is rejected rather than silently coerced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    amount: Decimal,
    unit: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("unit mismatch: {lhs} vs {rhs}")]
    UnitMismatch { lhs: String, rhs: String },
}

impl Quantity {
    pub fn new(amount: Decimal, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }

    pub fn zero(unit: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, unit)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity, QuantityError> {
        self.require_same_unit(other)?;
        Ok(Quantity {
            amount: self.amount + other.amount,
            unit: self.unit.clone(),
        })
    }

    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity, QuantityError> {
        self.require_same_unit(other)?;
        Ok(Quantity {
            amount: self.amount - other.amount,
            unit: self.unit.clone(),
        })
    }

    fn require_same_unit(&self, other: &Quantity) -> Result<(), QuantityError> {
        if self.unit != other.unit {
            return Err(QuantityError::UnitMismatch {
                lhs: self.unit.clone(),
                rhs: other.unit.clone(),
            });
        }
        Ok(())
    }
}
