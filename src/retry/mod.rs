//! Retry Module
//!
//! Retry policy, the retry loop, and observer hooks for reporting.

mod executor;
mod observer;
mod policy;

pub use executor::{AttemptFailure, Retrier, RetryFailure};
pub use observer::{NoopObserver, RetryEvent, RetryObserver, TracingObserver};
pub use policy::{RetryPolicy, RetryPolicyBuilder, DEFAULT_RETRYABLE_CODES, MIN_DELAY};
