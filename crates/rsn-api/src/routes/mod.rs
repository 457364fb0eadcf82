//! # Route Modules
//!
//! Each module defines an Axum `Router<AppState>` for one API surface
//! area; `crate::app` merges them behind the shared middleware stack.

pub mod chain;
pub mod ledger;
pub mod peer;
pub mod records;
pub mod status;
