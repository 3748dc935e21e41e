//! Upstream Guard - caching, rate limiting and retries for slow upstream APIs
//!
//! Puts token-bucket admission, TTL/LRU caches for credentials, permissions and
//! resource metadata, and a cancellable retry loop in front of an external API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod ratelimit;
pub mod retry;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheCoordinator};
pub use config::Config;
pub use guard::Guard;
pub use ratelimit::RateLimiter;
pub use retry::{AttemptFailure, Retrier, RetryPolicy};
