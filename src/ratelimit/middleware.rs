//! Axum admission middleware.
//!
//! Every response carries the decision in `x-ratelimit-*` headers; denials are
//! answered with 429 and a `retry-after` header without reaching the handler.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use crate::ratelimit::{RateDecision, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate limiting middleware.
///
/// The route key is the matched route template (e.g. `/cache/resources/:id`)
/// when axum has one, otherwise the raw request path. Install it with
/// `route_layer` so the matched path is available.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let decision = limiter.allow(&route);
    if !decision.allowed {
        warn!(
            route = %route,
            retry_after_ms = decision.retry_after.map(|d| d.as_millis() as u64),
            "Request rate limited"
        );
        return RateLimited(decision).into_response();
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), &decision);
    response
}

/// Writes the limit, remaining and reset headers for `decision`.
pub fn insert_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(decision.reset_at().timestamp()),
    );
}

/// 429 response for a denied decision.
pub struct RateLimited(pub RateDecision);

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let decision = self.0;
        let retry_after = decision.retry_after.unwrap_or_default();
        // Header is whole seconds, rounded up, never zero
        let retry_after_secs = retry_after.as_millis().div_ceil(1000).max(1) as u64;

        let body = Json(json!({
            "error": "Rate limit exceeded",
            "retry_after_ms": retry_after.as_millis() as u64,
        }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        let headers = response.headers_mut();
        insert_rate_headers(headers, &decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        response
    }
}
