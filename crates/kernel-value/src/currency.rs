use serde::{Deserialize, Serialize};
use std::fmt;

/// An ISO-4217 currency code, e.g. `USD`, `EUR`, `JPY`.
///
/// Stored upper-cased and compared by exact code equality; this type never
/// attempts to validate membership in the live ISO-4217 table (that is a
/// reference-data concern owned by the caller's chart-of-accounts module).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Build a currency from a 3-letter code, upper-casing it.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// Minor-unit scale conventionally used for this currency.
    ///
    /// Only the handful of well-known exceptions are special-cased; every
    /// other code defaults to 2 decimal places, matching common accounting
    /// practice.
    pub fn default_scale(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" | "CLP" => 0,
            "BHD" | "KWD" | "OMR" | "JOD" => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
