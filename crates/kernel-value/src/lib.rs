//! Decimal-exact value types: `Money`, `Currency`, `Quantity`.
//!
//! Nothing here ever touches a binary float. Monetary amounts are backed by
//! `rust_decimal::Decimal`; currency discipline (ISO-4217 code equality) is
//! enforced at every arithmetic boundary rather than left to callers.

#![deny(unsafe_code)]

mod currency;
mod money;
mod quantity;

pub use currency::Currency;
pub use money::{Money, MoneyError};
pub use quantity::{Quantity, QuantityError};
