//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CoordinatorStats;
use crate::ratelimit::{RateLimiter, RouteLimit};

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Per-cache size, capacity and metrics
    pub caches: CoordinatorStats,
    /// Entries across all caches
    pub total_entries: usize,
    /// State of the global bucket
    pub rate_limit: RateLimitSnapshot,
}

impl StatsResponse {
    pub fn new(caches: CoordinatorStats, rate_limit: RateLimitSnapshot) -> Self {
        Self {
            total_entries: caches.total_size(),
            caches,
            rate_limit,
        }
    }
}

/// Global bucket introspection
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub rate: f64,
    pub remaining: u32,
}

impl RateLimitSnapshot {
    pub fn of(limiter: &RateLimiter) -> Self {
        Self {
            limit: limiter.limit(),
            rate: limiter.rate(),
            remaining: limiter.remaining(),
        }
    }
}

/// Response body for GET /limits
#[derive(Debug, Clone, Serialize)]
pub struct LimitsResponse {
    pub global: RateLimitSnapshot,
    /// Route overrides, sorted by route
    pub routes: Vec<RouteLimit>,
}

/// Response body for PUT /limits
#[derive(Debug, Clone, Serialize)]
pub struct RouteLimitResponse {
    /// Success message
    pub message: String,
    #[serde(flatten)]
    pub limit: RouteLimit,
}

impl RouteLimitResponse {
    pub fn new(limit: RouteLimit) -> Self {
        Self {
            message: format!("Rate limit for '{}' set successfully", limit.route),
            limit,
        }
    }
}

/// Response body for cache invalidation and cleanup
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Success message
    pub message: String,
    /// Number of entries removed
    pub removed: usize,
}

impl InvalidateResponse {
    /// Creates a new InvalidateResponse for `scope`, e.g. `subject 'alice'`
    pub fn new(scope: impl AsRef<str>, removed: usize) -> Self {
        Self {
            message: format!("Invalidated {} ({} removed)", scope.as_ref(), removed),
            removed,
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheMetrics, CacheStats};

    fn empty_stats() -> CoordinatorStats {
        CoordinatorStats {
            credentials: CacheStats::new(1, 10, CacheMetrics::default()),
            permissions: CacheStats::new(2, 10, CacheMetrics::default()),
            resources: CacheStats::new(0, 10, CacheMetrics::default()),
        }
    }

    #[test]
    fn test_stats_response_totals_entries() {
        let limiter = RateLimiter::new(5.0, 10).unwrap();
        let resp = StatsResponse::new(empty_stats(), RateLimitSnapshot::of(&limiter));

        assert_eq!(resp.total_entries, 3);
        assert_eq!(resp.rate_limit.limit, 10);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["caches"]["permissions"]["size"], 2);
        assert_eq!(json["caches"]["credentials"]["hit_rate"], 0.0);
    }

    #[test]
    fn test_route_limit_response_flattens_limit() {
        let resp = RouteLimitResponse::new(RouteLimit::new("/stats", 1.5, 3));
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["route"], "/stats");
        assert_eq!(json["burst"], 3);
        assert!(json["message"].as_str().unwrap().contains("/stats"));
    }

    #[test]
    fn test_invalidate_response_serialize() {
        let resp = InvalidateResponse::new("subject 'alice'", 2);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("alice"));
        assert!(json.contains(r#""removed":2"#));
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
