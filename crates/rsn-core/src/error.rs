//! # Error Hierarchy
//!
//! Structured error types for the foundational layer, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Each variant carries the invalid input and the expected format so that
//! operators can diagnose misconfiguration without guesswork.

use thiserror::Error;

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Monetary amounts must be integer minor units.
    #[error("float values are not permitted in canonical representations; amounts must be integer minor units: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for domain primitive newtypes.
///
/// Each identifier type enforces format constraints at construction time.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Operator identifier does not conform to the consortium naming scheme.
    #[error("invalid operator id: \"{0}\" (expected 2-32 lowercase alphanumeric or '-' characters)")]
    InvalidOperatorId(String),

    /// Record identifier fails format validation.
    #[error("invalid record id: \"{0}\" (expected 1-128 printable ASCII characters)")]
    InvalidRecordId(String),

    /// IMSI does not conform to ITU E.212 (6-15 digits).
    #[error("invalid IMSI: \"{0}\" (expected 6-15 digits)")]
    InvalidImsi(String),

    /// Currency code is not three uppercase ASCII letters.
    #[error("invalid currency code: \"{0}\" (expected 3 uppercase letters, ISO 4217)")]
    InvalidCurrencyCode(String),

    /// An operator pair was constructed from a single operator.
    #[error("operator pair requires two distinct operators, got \"{0}\" twice")]
    SelfPair(String),

    /// Timestamp string is not valid UTC ISO 8601.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Digest hex string fails to decode to 32 bytes.
    #[error("invalid digest hex: \"{0}\" (expected 64 lowercase hex characters)")]
    InvalidDigestHex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_error_float_rejected() {
        let err = CanonicalizationError::FloatRejected(3.14);
        let msg = format!("{err}");
        assert!(msg.contains("float values are not permitted"));
        assert!(msg.contains("3.14"));
    }

    #[test]
    fn validation_error_invalid_operator_id() {
        let err = ValidationError::InvalidOperatorId("T Mobile".to_string());
        let msg = format!("{err}");
        assert!(msg.contains("T Mobile"));
        assert!(msg.contains("lowercase"));
    }

    #[test]
    fn validation_error_invalid_imsi() {
        let err = ValidationError::InvalidImsi("12ab".to_string());
        assert!(format!("{err}").contains("12ab"));
    }

    #[test]
    fn validation_error_self_pair() {
        let err = ValidationError::SelfPair("vodafone-uk".to_string());
        assert!(format!("{err}").contains("vodafone-uk"));
    }

    #[test]
    fn validation_error_invalid_timestamp() {
        let err = ValidationError::InvalidTimestamp {
            value: "not-a-date".to_string(),
            reason: "parse failed".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("not-a-date"));
        assert!(msg.contains("parse failed"));
    }

    #[test]
    fn all_error_types_are_debug() {
        let e1 = CanonicalizationError::FloatRejected(0.0);
        let e2 = ValidationError::InvalidCurrencyCode("eur".to_string());
        assert!(!format!("{e1:?}").is_empty());
        assert!(!format!("{e2:?}").is_empty());
    }
}
