//! Rate Limiting Module
//!
//! Token-bucket admission control with per-route overrides.

mod bucket;
mod limiter;
mod middleware;

pub use bucket::{RateDecision, TokenBucket};
pub use limiter::{RateLimiter, RouteLimit};
pub use middleware::{
    insert_rate_headers, rate_limit_middleware, RateLimited, X_RATELIMIT_LIMIT,
    X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
};
