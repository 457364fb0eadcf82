//! # Operator and Record Identifiers
//!
//! Domain-primitive newtypes for the settlement network. Each identifier is a
//! distinct type — you cannot pass a [`RecordId`] where an [`OperatorId`] is
//! expected.
//!
//! ## Validation
//!
//! All identifiers validate format at construction time. [`OperatorPair`] is
//! additionally normalized: the lexicographically smaller operator is always
//! `first`, so `(a, b)` and `(b, a)` are the same pair with the same ledger
//! entry and the same serialized form.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A consortium operator identifier (e.g., `tmobile-de`, `vodafone-uk`).
///
/// # Validation
///
/// - 2 to 32 characters
/// - lowercase ASCII alphanumeric and `-` only
/// - must not start or end with `-`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(String);

impl OperatorId {
    /// Create an operator identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidOperatorId`] if the string does not
    /// match the consortium naming scheme.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_valid_operator_name(&s) {
            return Err(ValidationError::InvalidOperatorId(s));
        }
        Ok(Self(s))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validator node identifier.
///
/// Validators are operated by consortium members, so the naming scheme is the
/// same as [`OperatorId`]. The types stay distinct: a block is signed by
/// validators, a debt is owed by operators, and conflating the two has caused
/// real accounting bugs in bilateral clearinghouses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatorId(String);

impl ValidatorId {
    /// Create a validator identifier, validating format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if !is_valid_operator_name(&s) {
            return Err(ValidationError::InvalidOperatorId(s));
        }
        Ok(Self(s))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OperatorId> for ValidatorId {
    fn from(op: OperatorId) -> Self {
        Self(op.0)
    }
}

fn is_valid_operator_name(s: &str) -> bool {
    s.len() >= 2
        && s.len() <= 32
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

/// A billing record identifier, assigned by the submitting operator.
///
/// Uniqueness is the idempotency key for ingestion: resubmitting a record
/// with a known identifier is a no-op, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record identifier, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRecordId`] unless the value is 1-128
    /// printable ASCII characters with no whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty()
            || s.len() > 128
            || !s.chars().all(|c| c.is_ascii_graphic())
        {
            return Err(ValidationError::InvalidRecordId(s));
        }
        Ok(Self(s))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// International Mobile Subscriber Identity (ITU E.212).
///
/// Carried on billing records for audit purposes only. Settlement math never
/// reads it, and it never leaves the node that ingested it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Imsi(String);

impl Imsi {
    /// Create an IMSI, validating the 6-15 digit format.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.len() < 6 || s.len() > 15 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidImsi(s));
        }
        Ok(Self(s))
    }

    /// Access the IMSI digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Imsi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An unordered pair of distinct operators, the key of a bilateral ledger.
///
/// Normalized at construction: `first` is always the lexicographically
/// smaller identifier. Debt direction is expressed relative to this ordering
/// by the ledger, never by field position in the pair itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorPair {
    first: OperatorId,
    second: OperatorId,
}

impl OperatorPair {
    /// Create a normalized pair from two distinct operators.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::SelfPair`] if both operators are the same.
    pub fn new(a: OperatorId, b: OperatorId) -> Result<Self, ValidationError> {
        if a == b {
            return Err(ValidationError::SelfPair(a.as_str().to_string()));
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self { first, second })
    }

    /// The lexicographically smaller operator.
    pub fn first(&self) -> &OperatorId {
        &self.first
    }

    /// The lexicographically larger operator.
    pub fn second(&self) -> &OperatorId {
        &self.second
    }

    /// Whether the given operator is a member of this pair.
    pub fn contains(&self, op: &OperatorId) -> bool {
        &self.first == op || &self.second == op
    }
}

impl std::fmt::Display for OperatorPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.first, self.second)
    }
}
