//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::config::Config;
use crate::error::{ApiError, ConfigError, Result};
use crate::guard::Guard;
use crate::models::{
    HealthResponse, InvalidateResponse, LimitsResponse, MessageResponse, RateLimitSnapshot,
    RouteLimitRequest, RouteLimitResponse, RouteQuery, StatsResponse,
};
use crate::ratelimit::RouteLimit;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<Guard>,
}

impl AppState {
    /// Creates a new AppState around an existing guard.
    pub fn new(guard: Guard) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Validates the configuration and builds the limiter, caches and retrier.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(Guard::from_config(config)?))
    }
}

// == Health & Stats ==
/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
///
/// Returns per-cache statistics and the state of the global bucket.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let guard = &state.guard;
    Json(StatsResponse::new(
        guard.caches().stats(),
        RateLimitSnapshot::of(guard.limiter()),
    ))
}

/// Handler for POST /stats/reset
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.guard.caches().reset_metrics();
    Json(MessageResponse::new("Cache metrics reset"))
}

// == Rate Limits ==
/// Handler for GET /limits
pub async fn list_limits_handler(State(state): State<AppState>) -> Json<LimitsResponse> {
    let limiter = state.guard.limiter();
    Json(LimitsResponse {
        global: RateLimitSnapshot::of(limiter),
        routes: limiter.list_route_limits(),
    })
}

/// Handler for PUT /limits
///
/// Installs or replaces the override for a route. The new bucket starts full.
pub async fn set_limit_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteLimitRequest>,
) -> Result<Json<RouteLimitResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state
        .guard
        .limiter()
        .set_route_limit(&req.route, req.rate, req.burst)?;

    Ok(Json(RouteLimitResponse::new(RouteLimit::new(
        req.route, req.rate, req.burst,
    ))))
}

/// Handler for DELETE /limits?route=...
pub async fn remove_limit_handler(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<MessageResponse>> {
    if !state.guard.limiter().remove_route_limit(&query.route) {
        return Err(ApiError::NotFound(format!(
            "No rate limit for route '{}'",
            query.route
        )));
    }

    Ok(Json(MessageResponse::new(format!(
        "Rate limit for '{}' removed",
        query.route
    ))))
}

// == Cache Maintenance ==
/// Handler for DELETE /cache
///
/// Drops every cached entry. Metrics are kept.
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.guard.caches().clear();
    info!("All caches cleared");
    Json(MessageResponse::new("All caches cleared"))
}

/// Handler for POST /cache/cleanup
///
/// Runs an expiry sweep now instead of waiting for the background task.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let removed = state.guard.caches().cleanup();
    Json(InvalidateResponse::new("expired entries", removed))
}

/// Handler for DELETE /cache/credentials/:id
pub async fn invalidate_credential_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    if !state.guard.caches().invalidate_credential(&id) {
        return Err(ApiError::NotFound(format!("Credential '{}' not cached", id)));
    }

    Ok(Json(InvalidateResponse::new(format!("credential '{}'", id), 1)))
}

/// Handler for DELETE /cache/subjects/:subject
///
/// Drops every cached permission held by the subject.
pub async fn invalidate_subject_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.guard.caches().invalidate_subject(&subject);
    Json(InvalidateResponse::new(format!("subject '{}'", subject), removed))
}

/// Handler for DELETE /cache/resources/:id
///
/// Drops the resource entry and every cached permission on it.
pub async fn invalidate_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.guard.caches().invalidate_resource(&id);
    Json(InvalidateResponse::new(format!("resource '{}'", id), removed))
}
