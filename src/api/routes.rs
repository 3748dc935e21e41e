//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_cache_handler, health_handler, invalidate_credential_handler,
    invalidate_resource_handler, invalidate_subject_handler, list_limits_handler,
    remove_limit_handler, reset_stats_handler, set_limit_handler, stats_handler, AppState,
};
use crate::ratelimit::rate_limit_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check, never rate limited
/// - `GET /stats` - Cache and rate limit statistics
/// - `POST /stats/reset` - Reset cache metrics
/// - `GET /limits` - Global limit and route overrides
/// - `PUT /limits` - Set a route override
/// - `DELETE /limits?route=` - Remove a route override
/// - `DELETE /cache` - Clear every cache
/// - `POST /cache/cleanup` - Remove expired entries now
/// - `DELETE /cache/credentials/:id` - Drop a cached credential
/// - `DELETE /cache/subjects/:subject` - Drop a subject's permissions
/// - `DELETE /cache/resources/:id` - Drop a resource and its permissions
///
/// # Middleware
/// - Rate limiting: every route except `/health`, keyed by route template
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let limiter = Arc::clone(state.guard.limiter());

    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/stats", get(stats_handler))
        .route("/stats/reset", post(reset_stats_handler))
        .route(
            "/limits",
            get(list_limits_handler)
                .put(set_limit_handler)
                .delete(remove_limit_handler),
        )
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/cleanup", post(cleanup_handler))
        .route("/cache/credentials/:id", delete(invalidate_credential_handler))
        .route("/cache/subjects/:subject", delete(invalidate_subject_handler))
        .route("/cache/resources/:id", delete(invalidate_resource_handler))
        // Applies to the routes above only
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
