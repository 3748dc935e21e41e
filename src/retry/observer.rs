//! Hooks for watching a retry loop from outside.
//!
//! The retry loop has no logging of its own; whoever builds a [`Retrier`]
//! decides where its events go.
//!
//! [`Retrier`]: crate::retry::Retrier

use std::time::Duration;

use tracing::warn;

/// A failed attempt as seen by an observer.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// 1-based attempt that just failed
    pub attempt: u32,
    pub code: u16,
    /// Wait before the next attempt; `None` when the loop is giving up
    pub delay: Option<Duration>,
    pub error: &'a anyhow::Error,
}

// == Retry Observer ==
/// Receives retry-loop events. Every method defaults to doing nothing.
pub trait RetryObserver: Send + Sync {
    /// A retryable failure; another attempt follows after `event.delay`.
    fn on_retry(&self, _event: &RetryEvent<'_>) {}

    /// The loop is returning a failure: non-retryable or out of budget.
    fn on_give_up(&self, _event: &RetryEvent<'_>) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Forwards events to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RetryObserver for TracingObserver {
    fn on_retry(&self, event: &RetryEvent<'_>) {
        warn!(
            attempt = event.attempt,
            code = event.code,
            delay_ms = event.delay.map(|d| d.as_millis() as u64),
            error = %event.error,
            "Retrying after error"
        );
    }

    fn on_give_up(&self, event: &RetryEvent<'_>) {
        warn!(
            attempt = event.attempt,
            code = event.code,
            error = %event.error,
            "Giving up"
        );
    }
}
