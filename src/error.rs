//! Error types for the guard
//!
//! Absence and denial are not errors here: cache misses come back as `None` and
//! rate-limit denials as a `RateDecision`. Errors are reserved for misconfiguration
//! and for the final outcome of a retried operation.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Config Error ==
/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Refill rate must be a positive, finite number of tokens per second
    #[error("Invalid rate: {0} (must be > 0)")]
    InvalidRate(f64),

    /// Bucket capacity must hold at least one token
    #[error("Invalid burst: {0} (must be >= 1)")]
    InvalidBurst(u32),

    /// Backoff multiplier must be positive
    #[error("Invalid multiplier: {0} (must be > 0)")]
    InvalidMultiplier(f64),

    /// Jitter factor must lie in [0, 1]
    #[error("Invalid jitter factor: {0} (must be within [0, 1])")]
    InvalidJitter(f64),

    /// Delay bounds are inconsistent
    #[error("Invalid delay: {0}")]
    InvalidDelay(String),

    /// A `route=rate:burst` entry could not be parsed
    #[error("Invalid route limit '{0}'")]
    InvalidRouteLimit(String),
}

// == Retry Error ==
/// Final outcome of a retried operation that did not succeed.
#[derive(Error, Debug)]
pub enum RetryError {
    /// The attempt failed with a code outside the retryable set
    #[error("Non-retryable failure (code {code}) on attempt {attempts}: {source}")]
    NonRetryable {
        code: u16,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// Every allowed attempt failed with a retryable code
    #[error("Retry budget exhausted after {attempts} attempts (last code {code}): {source}")]
    Exhausted {
        attempts: u32,
        code: u16,
        #[source]
        source: anyhow::Error,
    },

    /// The caller's cancellation token fired
    #[error("Operation cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    /// True when the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// True when the caller cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Classifier of the last failed attempt, if one ran.
    pub fn code(&self) -> Option<u16> {
        match self {
            RetryError::NonRetryable { code, .. } | RetryError::Exhausted { code, .. } => {
                Some(*code)
            }
            RetryError::Cancelled { .. } => None,
        }
    }

    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

// == Stop Error ==
/// Raised when the coordinator's sweep is stopped a second time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    #[error("Cache coordinator already stopped")]
    AlreadyStopped,
}

// == Guard Error ==
/// Outcome of a guarded call that did not produce a value.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Admission was denied for the route
    #[error("Rate limited, retry after {}ms", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    /// The upstream call failed
    #[error(transparent)]
    Retry(#[from] RetryError),
}

// == Api Error ==
/// Error type returned by the admin HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rejected configuration values
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) | ApiError::Config(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the admin API.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_exhausted_exposes_last_cause() {
        let err = RetryError::Exhausted {
            attempts: 4,
            code: 503,
            source: anyhow::anyhow!("upstream unavailable"),
        };

        assert!(err.is_exhausted());
        assert!(!err.is_cancelled());
        assert_eq!(err.code(), Some(503));
        assert_eq!(err.attempts(), 4);
        let cause = err.source().unwrap();
        assert_eq!(cause.to_string(), "upstream unavailable");
    }

    #[test]
    fn test_cancelled_has_no_code() {
        let err = RetryError::Cancelled { attempts: 2 };
        assert!(err.is_cancelled());
        assert_eq!(err.code(), None);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_api_error_status_codes() {
        let resp = ApiError::NotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::from(ConfigError::InvalidBurst(0)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
