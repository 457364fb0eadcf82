//! # Currency Codes
//!
//! ISO 4217 alphabetic currency codes. A settlement zone operates in exactly
//! one currency; records denominated in any other currency are rejected at
//! ingestion. Conversion is out of scope for the network.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An ISO 4217 alphabetic currency code (e.g., `EUR`).
///
/// Amounts throughout the network are integer minor units of this currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a currency code, validating the three-uppercase-letter format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrencyCode(s));
        }
        Ok(Self(s))
    }

    /// Access the code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(CurrencyCode::new("EUR").is_ok());
        assert!(CurrencyCode::new("NOK").is_ok());
    }

    #[test]
    fn rejects_invalid() {
        assert!(CurrencyCode::new("eur").is_err());
        assert!(CurrencyCode::new("EURO").is_err());
        assert!(CurrencyCode::new("E1").is_err());
        assert!(CurrencyCode::new("").is_err());
    }
}
