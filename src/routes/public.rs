use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Unauthenticated endpoints. They still pass through the global stages (rate limiting,
/// logging, error normalization).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // API name, version and the top-level endpoint map.
        .route("/", get(handlers::root))
        // GET /health
        // Liveness probe for monitors and load balancers.
        .route("/health", get(handlers::health))
}
