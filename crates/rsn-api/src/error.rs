//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from rsn-ledger and rsn-consensus to HTTP status
//! codes with JSON error bodies carrying a machine-readable code. Internal
//! error details are logged server-side, never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rsn_consensus::ConsensusError;
use rsn_ledger::{LedgerError, RecordRejection};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error payload.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "CHARGE_MISMATCH", "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type for every route handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A record failed admission validation (422, rejection code in body).
    #[error("record rejected: {0}")]
    Rejected(RecordRejection),

    /// Authentication failure (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A peer message conflicts with local consensus state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal error (500). Logged but not returned to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Rejected(rejection) => (StatusCode::UNPROCESSABLE_ENTITY, rejection.code()),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let code = code.to_string();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Conflict(_) => tracing::warn!(error = %self, "peer message conflict"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(rejection) => Self::Rejected(rejection),
            LedgerError::Overflow(e) => Self::Validation(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ConsensusError> for AppError {
    fn from(err: ConsensusError) -> Self {
        match err {
            ConsensusError::Ledger(e) => Self::from(e),
            ConsensusError::Store(e) => Self::Internal(e.to_string()),
            ConsensusError::MalformedStoredBlock { .. } => Self::Internal(err.to_string()),
            // Everything else is a peer disagreeing with local state.
            other => Self::Conflict(other.to_string()),
        }
    }
}

impl From<rsn_core::ValidationError> for AppError {
    fn from(err: rsn_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_code_flows_into_body() {
        let err = AppError::Rejected(RecordRejection::ZeroCharge);
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "ZERO_CHARGE");
    }

    #[test]
    fn internal_detail_is_hidden() {
        let response = AppError::Internal("connection string leak".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
