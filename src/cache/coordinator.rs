//! Cache Coordinator Module
//!
//! Owns the three domain caches and keeps their key conventions in one place.
//!
//! | Cache       | Key                        |
//! |-------------|----------------------------|
//! | credentials | credential id              |
//! | permissions | `"<subject>:<resource>"`   |
//! | resources   | resource id                |

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{
    credential_ttl, Cache, CacheStats, CachedCredential, CachedPermission, ResourceInfo,
    CREDENTIAL_TTL_RATIO,
};
use crate::error::StopError;
use crate::tasks::{spawn_sweep_task, Sweep, SweepHandle};

/// Separator between subject and resource in permission keys.
pub const PERMISSION_KEY_SEPARATOR: char = ':';

/// Builds the permission cache key for `subject` acting on `resource`.
pub fn permission_key(subject: &str, resource: &str) -> String {
    format!("{subject}{PERMISSION_KEY_SEPARATOR}{resource}")
}

// == Coordinator Config ==
/// Capacity and TTL for each domain cache, plus the sweep interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub credential_capacity: usize,
    /// Lifetime upstream grants a credential; the cache keeps them for less
    pub credential_lifetime: Duration,
    pub permission_capacity: usize,
    pub permission_ttl: Duration,
    pub resource_capacity: usize,
    pub resource_ttl: Duration,
    /// Interval of the background expiry sweep, zero disables it
    pub sweep_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            credential_capacity: 1000,
            credential_lifetime: Duration::from_secs(3600),
            permission_capacity: 5000,
            permission_ttl: Duration::from_secs(300),
            resource_capacity: 2000,
            resource_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

// == Coordinator Stats ==
/// Per-cache snapshot returned by [`CacheCoordinator::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStats {
    pub credentials: CacheStats,
    pub permissions: CacheStats,
    pub resources: CacheStats,
}

impl CoordinatorStats {
    pub fn total_size(&self) -> usize {
        self.credentials.size + self.permissions.size + self.resources.size
    }
}

/// The three caches as one sweepable unit, shared with the sweep task.
#[derive(Debug, Clone)]
struct DomainCaches {
    credentials: Cache<CachedCredential>,
    permissions: Cache<CachedPermission>,
    resources: Cache<ResourceInfo>,
}

impl Sweep for DomainCaches {
    fn sweep(&self) -> usize {
        self.credentials.cleanup() + self.permissions.cleanup() + self.resources.cleanup()
    }
}

#[derive(Debug)]
enum SweepState {
    /// Running, or never started because the interval was zero
    Active(Option<SweepHandle>),
    Stopped,
}

// == Cache Coordinator ==
/// Typed credential, permission and resource caches with scoped invalidation.
#[derive(Debug)]
pub struct CacheCoordinator {
    caches: DomainCaches,
    sweep: Mutex<SweepState>,
}

impl CacheCoordinator {
    // == Constructor ==
    /// Builds the three caches and, if `sweep_interval` is non-zero, starts the
    /// background sweep. A non-zero interval requires a Tokio runtime.
    pub fn new(config: &CoordinatorConfig) -> Self {
        let caches = DomainCaches {
            credentials: Cache::new(
                config.credential_capacity,
                credential_ttl(config.credential_lifetime),
            ),
            permissions: Cache::new(config.permission_capacity, config.permission_ttl),
            resources: Cache::new(config.resource_capacity, config.resource_ttl),
        };

        let handle = if config.sweep_interval.is_zero() {
            None
        } else {
            Some(spawn_sweep_task(caches.clone(), config.sweep_interval))
        };

        Self {
            caches,
            sweep: Mutex::new(SweepState::Active(handle)),
        }
    }

    // == Sub-caches ==
    pub fn credentials(&self) -> &Cache<CachedCredential> {
        &self.caches.credentials
    }

    pub fn permissions(&self) -> &Cache<CachedPermission> {
        &self.caches.permissions
    }

    pub fn resources(&self) -> &Cache<ResourceInfo> {
        &self.caches.resources
    }

    // == Credentials ==
    pub fn credential(&self, id: &str) -> Option<CachedCredential> {
        self.caches.credentials.get(id)
    }

    /// Caches `credential` under `id`.
    ///
    /// The TTL is the cache default, shortened to a fraction of the
    /// credential's own remaining lifetime when that is sooner. Credentials
    /// already past their expiry are not cached. Returns whether it was stored.
    pub fn cache_credential(&self, id: &str, credential: CachedCredential) -> bool {
        let remaining = credential.remaining_lifetime();
        if remaining.is_zero() {
            debug!(credential = id, "Refusing to cache an expired credential");
            return false;
        }

        let ttl = self
            .caches
            .credentials
            .default_ttl()
            .min(remaining.mul_f64(CREDENTIAL_TTL_RATIO));
        self.caches.credentials.set_with_ttl(id, credential, ttl);
        true
    }

    // == Permissions ==
    pub fn permission(&self, subject: &str, resource: &str) -> Option<CachedPermission> {
        self.caches.permissions.get(&permission_key(subject, resource))
    }

    pub fn cache_permission(&self, permission: CachedPermission) {
        let key = permission_key(&permission.subject, &permission.resource);
        self.caches.permissions.set(key, permission);
    }

    // == Resources ==
    pub fn resource(&self, id: &str) -> Option<ResourceInfo> {
        self.caches.resources.get(id)
    }

    pub fn cache_resource(&self, info: ResourceInfo) {
        let id = info.id.clone();
        self.caches.resources.set(id, info);
    }

    // == Invalidation ==
    /// Drops the resource entry for `id` and every permission on it.
    ///
    /// Returns the number of entries removed across both caches.
    pub fn invalidate_resource(&self, id: &str) -> usize {
        let resource = usize::from(self.caches.resources.delete(id));
        let suffix = format!("{PERMISSION_KEY_SEPARATOR}{id}");
        let permissions = self.caches.permissions.delete_suffix(&suffix);

        debug!(resource = id, permissions, "Invalidated resource");
        resource + permissions
    }

    /// Drops every permission held by `subject`. Returns the number removed.
    pub fn invalidate_subject(&self, subject: &str) -> usize {
        let prefix = format!("{subject}{PERMISSION_KEY_SEPARATOR}");
        let removed = self.caches.permissions.delete_prefix(&prefix);

        debug!(subject, removed, "Invalidated subject");
        removed
    }

    /// Drops the credential cached under `id`.
    pub fn invalidate_credential(&self, id: &str) -> bool {
        self.caches.credentials.delete(id)
    }

    // == Maintenance ==
    /// Removes expired entries from all three caches, returning the total.
    pub fn cleanup(&self) -> usize {
        self.caches.sweep()
    }

    pub fn clear(&self) {
        self.caches.credentials.clear();
        self.caches.permissions.clear();
        self.caches.resources.clear();
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            credentials: self.caches.credentials.stats(),
            permissions: self.caches.permissions.stats(),
            resources: self.caches.resources.stats(),
        }
    }

    pub fn reset_metrics(&self) {
        self.caches.credentials.reset_metrics();
        self.caches.permissions.reset_metrics();
        self.caches.resources.reset_metrics();
    }

    // == Stop ==
    /// Stops the background sweep and waits for it to exit.
    ///
    /// Call this exactly once. A second call is a caller bug and is reported
    /// as [`StopError::AlreadyStopped`]; the caches themselves stay usable
    /// after stopping, they just are no longer swept.
    pub async fn stop(&self) -> Result<(), StopError> {
        let handle = match std::mem::replace(&mut *self.sweep.lock(), SweepState::Stopped) {
            SweepState::Active(handle) => handle,
            SweepState::Stopped => return Err(StopError::AlreadyStopped),
        };

        if let Some(handle) = handle {
            handle.stop().await;
        }

        info!("Cache coordinator stopped");
        Ok(())
    }
}
