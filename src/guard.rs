//! Guard Module
//!
//! Puts the rate limiter, the caches and the retrier in front of an upstream
//! API. A unit of work is admitted first, then served from cache when
//! possible, and only on a miss sent upstream through the retry loop, whose
//! result is cached for the next caller.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{
    CacheCoordinator, CachedCredential, CachedPermission, CoordinatorConfig, ResourceInfo,
};
use crate::config::Config;
use crate::error::{ConfigError, GuardError, RetryError};
use crate::ratelimit::{RateDecision, RateLimiter};
use crate::retry::{AttemptFailure, Retrier, TracingObserver};

/// Limiter, caches and retrier for one upstream.
///
/// Admission is per unit of work, not per lookup. [`Guard::call`] admits its
/// route itself. The cached lookups ([`Guard::credential`],
/// [`Guard::permission`], [`Guard::resource`]) never take a token, so callers
/// pass [`Guard::admit`] once before issuing them.
#[derive(Debug, Clone)]
pub struct Guard {
    limiter: Arc<RateLimiter>,
    caches: Arc<CacheCoordinator>,
    retrier: Retrier,
}

impl Guard {
    // == Constructors ==
    pub fn new(limiter: Arc<RateLimiter>, caches: Arc<CacheCoordinator>, retrier: Retrier) -> Self {
        Self {
            limiter,
            caches,
            retrier,
        }
    }

    /// Builds every component from `config`, reporting retries through `tracing`.
    ///
    /// Starts the cache sweep when its interval is non-zero, so it needs a
    /// Tokio runtime in that case.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let limiter = RateLimiter::with_routes(
            config.rate_limit_rate,
            config.rate_limit_burst,
            config.route_limits.iter().cloned(),
        )?;
        let caches = CacheCoordinator::new(&config.coordinator_config());
        let retrier =
            Retrier::new(config.retry_policy()).with_observer(Arc::new(TracingObserver));

        Ok(Self::new(Arc::new(limiter), Arc::new(caches), retrier))
    }

    /// Guard with default limits and caches but no background sweep.
    pub fn unswept(limiter: RateLimiter, retrier: Retrier) -> Self {
        let caches = CacheCoordinator::new(&CoordinatorConfig {
            sweep_interval: std::time::Duration::ZERO,
            ..Default::default()
        });
        Self::new(Arc::new(limiter), Arc::new(caches), retrier)
    }

    // == Accessors ==
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn caches(&self) -> &Arc<CacheCoordinator> {
        &self.caches
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    // == Admission ==
    /// Takes a token for `route`, or reports how long until one is available.
    pub fn admit(&self, route: &str) -> Result<RateDecision, GuardError> {
        let decision = self.limiter.allow(route);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(GuardError::RateLimited {
                retry_after: decision.retry_after.unwrap_or_default(),
            })
        }
    }

    /// Admits `route`, then runs `operation` through the retry loop.
    pub async fn call<T, F, Fut>(
        &self,
        route: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        self.admit(route)?;
        Ok(self.retrier.execute(cancel, operation).await?)
    }

    // == Cached Lookups ==
    /// Cached credential for `id`, fetching and caching it on a miss.
    ///
    /// Does not consult the limiter; admit the surrounding unit of work first.
    pub async fn credential<F, Fut>(
        &self,
        id: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<CachedCredential, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CachedCredential, AttemptFailure>>,
    {
        if let Some(credential) = self.caches.credential(id) {
            return Ok(credential);
        }

        debug!(credential = id, "Credential cache miss");
        let credential = self.retrier.execute(cancel, fetch).await?;
        self.caches.cache_credential(id, credential.clone());
        Ok(credential)
    }

    /// Cached permission of `subject` on `resource`, fetching it on a miss.
    ///
    /// Denials are cached too, so a refused subject does not hit upstream again
    /// until the entry expires or is invalidated.
    pub async fn permission<F, Fut>(
        &self,
        subject: &str,
        resource: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<CachedPermission, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<CachedPermission, AttemptFailure>>,
    {
        if let Some(permission) = self.caches.permission(subject, resource) {
            return Ok(permission);
        }

        debug!(subject, resource, "Permission cache miss");
        let permission = self.retrier.execute(cancel, fetch).await?;
        self.caches.cache_permission(permission.clone());
        Ok(permission)
    }

    /// Cached metadata for resource `id`, fetching it on a miss.
    pub async fn resource<F, Fut>(
        &self,
        id: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<ResourceInfo, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ResourceInfo, AttemptFailure>>,
    {
        if let Some(info) = self.caches.resource(id) {
            return Ok(info);
        }

        debug!(resource = id, "Resource cache miss");
        let info = self.retrier.execute(cancel, fetch).await?;
        self.caches.cache_resource(info.clone());
        Ok(info)
    }
}
