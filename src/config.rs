//! Configuration Module
//!
//! Handles loading and managing guard configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::cache::CoordinatorConfig;
use crate::error::ConfigError;
use crate::ratelimit::RouteLimit;
use crate::retry::{RetryPolicy, DEFAULT_RETRYABLE_CODES};

/// Guard configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// HTTP server port for the admin API
    pub server_port: u16,

    /// Maximum credentials cached, 0 for unlimited
    pub credential_cache_capacity: usize,
    /// Lifetime upstream grants a credential, in seconds
    pub credential_lifetime_secs: u64,
    pub permission_cache_capacity: usize,
    pub permission_ttl_secs: u64,
    pub resource_cache_capacity: usize,
    pub resource_ttl_secs: u64,
    /// Expiry sweep interval in seconds, 0 disables the sweep
    pub sweep_interval_secs: u64,

    /// Global refill rate in tokens per second
    pub rate_limit_rate: f64,
    /// Global bucket capacity
    pub rate_limit_burst: u32,
    /// Per-route overrides
    pub route_limits: Vec<RouteLimit>,

    pub retry_max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_multiplier: f64,
    pub retry_jitter: f64,
    /// Failure codes worth retrying
    pub retry_codes: Vec<u16>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    /// - `CREDENTIAL_CACHE_CAPACITY` - Cached credentials (default: 1000)
    /// - `CREDENTIAL_LIFETIME_SECS` - Upstream credential lifetime (default: 3600)
    /// - `PERMISSION_CACHE_CAPACITY` - Cached permissions (default: 5000)
    /// - `PERMISSION_TTL_SECS` - Permission TTL (default: 300)
    /// - `RESOURCE_CACHE_CAPACITY` - Cached resources (default: 2000)
    /// - `RESOURCE_TTL_SECS` - Resource TTL (default: 600)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Expiry sweep frequency (default: 60)
    /// - `RATE_LIMIT_RATE` - Global tokens per second (default: 10)
    /// - `RATE_LIMIT_BURST` - Global burst (default: 20)
    /// - `RATE_LIMIT_ROUTES` - Comma separated `route=rate:burst` overrides
    /// - `RETRY_MAX_RETRIES` - Retries after the first attempt (default: 3)
    /// - `RETRY_INITIAL_DELAY_MS` - First backoff (default: 100)
    /// - `RETRY_MAX_DELAY_MS` - Backoff cap (default: 10000)
    /// - `RETRY_MULTIPLIER` - Backoff multiplier (default: 2.0)
    /// - `RETRY_JITTER` - Jitter factor (default: 0.25)
    /// - `RETRY_CODES` - Comma separated retryable codes (default: 408,429,500,502,503,504)
    ///
    /// Unparseable values fall back to their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port),
            credential_cache_capacity: parse_or(
                &lookup,
                "CREDENTIAL_CACHE_CAPACITY",
                defaults.credential_cache_capacity,
            ),
            credential_lifetime_secs: parse_or(
                &lookup,
                "CREDENTIAL_LIFETIME_SECS",
                defaults.credential_lifetime_secs,
            ),
            permission_cache_capacity: parse_or(
                &lookup,
                "PERMISSION_CACHE_CAPACITY",
                defaults.permission_cache_capacity,
            ),
            permission_ttl_secs: parse_or(
                &lookup,
                "PERMISSION_TTL_SECS",
                defaults.permission_ttl_secs,
            ),
            resource_cache_capacity: parse_or(
                &lookup,
                "RESOURCE_CACHE_CAPACITY",
                defaults.resource_cache_capacity,
            ),
            resource_ttl_secs: parse_or(&lookup, "RESOURCE_TTL_SECS", defaults.resource_ttl_secs),
            sweep_interval_secs: parse_or(
                &lookup,
                "CACHE_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            ),
            rate_limit_rate: parse_or(&lookup, "RATE_LIMIT_RATE", defaults.rate_limit_rate),
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", defaults.rate_limit_burst),
            route_limits: lookup("RATE_LIMIT_ROUTES")
                .map(|raw| parse_route_limits(&raw))
                .unwrap_or_default(),
            retry_max_retries: parse_or(&lookup, "RETRY_MAX_RETRIES", defaults.retry_max_retries),
            retry_initial_delay_ms: parse_or(
                &lookup,
                "RETRY_INITIAL_DELAY_MS",
                defaults.retry_initial_delay_ms,
            ),
            retry_max_delay_ms: parse_or(
                &lookup,
                "RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay_ms,
            ),
            retry_multiplier: parse_or(&lookup, "RETRY_MULTIPLIER", defaults.retry_multiplier),
            retry_jitter: parse_or(&lookup, "RETRY_JITTER", defaults.retry_jitter),
            retry_codes: lookup("RETRY_CODES")
                .map(|raw| parse_codes(&raw))
                .unwrap_or(defaults.retry_codes),
        }
    }

    // == Validation ==
    /// Rejects values the limiter or retry policy cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_limit(self.rate_limit_rate, self.rate_limit_burst)?;
        for limit in &self.route_limits {
            check_limit(limit.rate, limit.burst)?;
        }
        self.retry_policy().validate()
    }

    // == Component Configs ==
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            credential_capacity: self.credential_cache_capacity,
            credential_lifetime: Duration::from_secs(self.credential_lifetime_secs),
            permission_capacity: self.permission_cache_capacity,
            permission_ttl: Duration::from_secs(self.permission_ttl_secs),
            resource_capacity: self.resource_cache_capacity,
            resource_ttl: Duration::from_secs(self.resource_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    /// Retry policy described by the `RETRY_*` values. Not validated.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            multiplier: self.retry_multiplier,
            jitter_factor: self.retry_jitter,
            retryable_codes: self.retry_codes.iter().copied().collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            credential_cache_capacity: 1000,
            credential_lifetime_secs: 3600,
            permission_cache_capacity: 5000,
            permission_ttl_secs: 300,
            resource_cache_capacity: 2000,
            resource_ttl_secs: 600,
            sweep_interval_secs: 60,
            rate_limit_rate: 10.0,
            rate_limit_burst: 20,
            route_limits: Vec::new(),
            retry_max_retries: 3,
            retry_initial_delay_ms: 100,
            retry_max_delay_ms: 10_000,
            retry_multiplier: 2.0,
            retry_jitter: 0.25,
            retry_codes: DEFAULT_RETRYABLE_CODES.to_vec(),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn check_limit(rate: f64, burst: u32) -> Result<(), ConfigError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::InvalidRate(rate));
    }
    if burst == 0 {
        return Err(ConfigError::InvalidBurst(burst));
    }
    Ok(())
}

/// Parses comma separated `route=rate:burst` entries, skipping malformed ones.
fn parse_route_limits(raw: &str) -> Vec<RouteLimit> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match RouteLimit::parse(entry) {
            Ok(limit) => Some(limit),
            Err(e) => {
                warn!(error = %e, "Ignoring route limit");
                None
            }
        })
        .collect()
}

fn parse_codes(raw: &str) -> Vec<u16> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .filter_map(|code| match code.parse() {
            Ok(code) => Some(code),
            Err(_) => {
                warn!(code, "Ignoring retry code");
                None
            }
        })
        .collect()
}
