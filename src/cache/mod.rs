//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction, and the
//! coordinator that composes typed caches for credentials, permissions and
//! resource metadata.

mod coordinator;
mod domain;
mod entry;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use coordinator::{
    permission_key, CacheCoordinator, CoordinatorConfig, CoordinatorStats,
    PERMISSION_KEY_SEPARATOR,
};
pub use domain::{
    credential_ttl, CachedCredential, CachedPermission, ResourceInfo, CREDENTIAL_TTL_RATIO,
};
pub use entry::Entry;
pub use lru::LruTracker;
pub use stats::{CacheMetrics, CacheStats};
pub use store::Cache;
