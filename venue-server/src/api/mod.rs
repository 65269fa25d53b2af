//! API route modules.
//!
//! # Structure
//!
//! - [`health`] - liveness check
//! - [`orders`] - order mutation and query endpoints

pub mod health;
pub mod orders;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::core::AppState;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Assemble the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
