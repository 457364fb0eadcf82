//! # rsn-api — HTTP Surface of a Settlement Node
//!
//! Axum services for a roaming settlement node: charge record ingestion,
//! ledger and chain reads, validator peer exchange, and node diagnostics.
//!
//! ## API Surface
//!
//! | Prefix               | Module               | Domain                  |
//! |----------------------|----------------------|-------------------------|
//! | `/v1/records/*`      | [`routes::records`]  | BCE record ingestion    |
//! | `/v1/ledger/*`       | [`routes::ledger`]   | Bilateral pair reads    |
//! | `/v1/chain/*`        | [`routes::chain`]    | Settlement chain reads  |
//! | `/v1/peer/*`         | [`routes::peer`]     | Validator consensus     |
//! | `/v1/node/status`    | [`routes::status`]   | Node diagnostics        |
//!
//! Health probes (`/health/*`) are mounted outside the auth middleware.

#![deny(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod node;
pub mod peers;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use crate::config::{ConfigError, NodeManifest};
pub use crate::error::{AppError, ErrorBody};
pub use crate::state::AppState;

/// Assemble the full application router.
///
/// All `/v1/*` routes sit behind bearer auth; the health probes do not.
pub fn app(state: AppState, auth_token: Option<String>) -> Router {
    let auth_config = AuthConfig { token: auth_token };

    // 1 MiB body cap; block commits with many records stay well under it.
    let api = Router::new()
        .merge(routes::records::router())
        .merge(routes::ledger::router())
        .merge(routes::chain::router())
        .merge(routes::peer::router())
        .merge(routes::status::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Exercises the ledger store and the chain replica;
/// returns 503 with a diagnostic when either is unusable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.ledger.entries() {
        tracing::warn!(error = %e, "ledger store health check failed");
        return (StatusCode::SERVICE_UNAVAILABLE, "ledger store unreachable").into_response();
    }
    if let Err(e) = state.chain.next_height() {
        tracing::warn!(error = %e, "chain store health check failed");
        return (StatusCode::SERVICE_UNAVAILABLE, "chain store unreachable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
