//! Route-aware rate limiter.
//!
//! One global bucket plus per-route overrides. Lookups take the route table's
//! read lock only long enough to clone the bucket handle; the decision itself
//! runs under that bucket's own lock, so unrelated routes never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::ratelimit::{RateDecision, TokenBucket};

// == Route Limit ==
/// Rate and burst configured for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLimit {
    pub route: String,
    pub rate: f64,
    pub burst: u32,
}

impl RouteLimit {
    pub fn new(route: impl Into<String>, rate: f64, burst: u32) -> Self {
        Self {
            route: route.into(),
            rate,
            burst,
        }
    }

    /// Parses `route=rate:burst`, e.g. `/stats=5:10`.
    pub fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRouteLimit(entry.to_string());

        let (route, limits) = entry.trim().rsplit_once('=').ok_or_else(invalid)?;
        let (rate, burst) = limits.split_once(':').ok_or_else(invalid)?;
        let route = route.trim();
        if route.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            route: route.to_string(),
            rate: rate.trim().parse().map_err(|_| invalid())?,
            burst: burst.trim().parse().map_err(|_| invalid())?,
        })
    }
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    global: Arc<TokenBucket>,
    routes: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl RateLimiter {
    // == Constructor ==
    /// Creates a limiter whose global bucket refills at `rate` up to `burst`.
    pub fn new(rate: f64, burst: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            global: Arc::new(TokenBucket::new(rate, burst)?),
            routes: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a limiter with the given global limit and route overrides.
    pub fn with_routes(
        rate: f64,
        burst: u32,
        routes: impl IntoIterator<Item = RouteLimit>,
    ) -> Result<Self, ConfigError> {
        let limiter = Self::new(rate, burst)?;
        for limit in routes {
            limiter.set_route_limit(&limit.route, limit.rate, limit.burst)?;
        }
        Ok(limiter)
    }

    // == Admission ==
    /// Admission decision for `route`, falling back to the global bucket.
    pub fn allow(&self, route: &str) -> RateDecision {
        self.bucket_for(route).allow()
    }

    /// Admission decision against the global bucket only.
    pub fn allow_global(&self) -> RateDecision {
        self.global.allow()
    }

    fn bucket_for(&self, route: &str) -> Arc<TokenBucket> {
        self.routes
            .read()
            .get(route)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.global))
    }

    // == Route Overrides ==
    /// Installs (or replaces) a full bucket for `route`.
    pub fn set_route_limit(&self, route: &str, rate: f64, burst: u32) -> Result<(), ConfigError> {
        let bucket = Arc::new(TokenBucket::new(rate, burst)?);
        self.routes.write().insert(route.to_string(), bucket);

        info!(route, rate, burst, "Route rate limit set");
        Ok(())
    }

    /// Removes the override for `route`. Returns whether one existed.
    pub fn remove_route_limit(&self, route: &str) -> bool {
        let removed = self.routes.write().remove(route).is_some();
        if removed {
            info!(route, "Route rate limit removed");
        }
        removed
    }

    /// All overrides, sorted by route.
    pub fn list_route_limits(&self) -> Vec<RouteLimit> {
        let mut limits: Vec<RouteLimit> = self
            .routes
            .read()
            .iter()
            .map(|(route, bucket)| RouteLimit::new(route.clone(), bucket.rate(), bucket.limit()))
            .collect();
        limits.sort_by(|a, b| a.route.cmp(&b.route));
        limits
    }

    // == Global Introspection ==
    pub fn remaining(&self) -> u32 {
        self.global.remaining()
    }

    pub fn limit(&self) -> u32 {
        self.global.limit()
    }

    pub fn rate(&self) -> f64 {
        self.global.rate()
    }
}
