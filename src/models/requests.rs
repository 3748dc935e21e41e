//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Request body for installing a route override (PUT /limits)
///
/// # Fields
/// - `route`: Route template the override applies to, e.g. `/stats`
/// - `rate`: Refill rate in tokens per second
/// - `burst`: Bucket capacity
#[derive(Debug, Clone, Deserialize)]
pub struct RouteLimitRequest {
    pub route: String,
    pub rate: f64,
    pub burst: u32,
}

impl RouteLimitRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid. Rate and
    /// burst are checked by the limiter itself.
    pub fn validate(&self) -> Option<String> {
        if self.route.is_empty() {
            return Some("Route cannot be empty".to_string());
        }
        if !self.route.starts_with('/') {
            return Some(format!("Route '{}' must start with '/'", self.route));
        }
        None
    }
}

/// Query string selecting a route (DELETE /limits?route=...)
#[derive(Debug, Clone, Deserialize)]
pub struct RouteQuery {
    pub route: String,
}
