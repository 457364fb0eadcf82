//! # Bearer Token Authentication
//!
//! Shared-secret bearer auth for every API route except the health probes.
//! Token comparison is constant time. When no token is configured the
//! middleware passes everything through, which is the single-node
//! development mode.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Auth settings injected into the middleware as an extension.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The shared bearer token; `None` disables authentication.
    pub token: Option<String>,
}

/// Constant-time equality over token bytes.
fn token_matches(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

/// Tower middleware enforcing the bearer token.
pub async fn auth_middleware(
    Extension(config): Extension<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &config.token else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token_matches(expected, token) => next.run(request).await,
        Some(_) => AppError::Unauthorized("invalid bearer token".to_string()).into_response(),
        None => AppError::Unauthorized("missing bearer token".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_compare_equal() {
        assert!(token_matches("secret-token", "secret-token"));
    }

    #[test]
    fn differing_tokens_compare_unequal() {
        assert!(!token_matches("secret-token", "secret-tokeN"));
        assert!(!token_matches("secret-token", "secret"));
        assert!(!token_matches("secret-token", ""));
    }
}
