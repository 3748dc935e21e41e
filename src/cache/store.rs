//! Cache Store Module
//!
//! Generic cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::{CacheMetrics, CacheStats, Entry, LruTracker};

// == Cache ==
/// Bounded key/value cache with LRU eviction and per-entry TTL.
///
/// `Cache` is a shared handle: clones point at the same storage, so it can be
/// handed to background tasks and request handlers alike. Every operation takes
/// the cache's single lock for its whole duration and never calls out while
/// holding it.
///
/// Absence, expiry and eviction are normal outcomes and are reported through
/// return values and [`CacheMetrics`], never through errors.
pub struct Cache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    /// Maximum number of entries, 0 = unlimited
    capacity: usize,
    /// TTL used by [`Cache::set`]
    default_ttl: Duration,
}

#[derive(Debug)]
struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    lru: LruTracker,
    metrics: CacheMetrics,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
            default_ttl: self.default_ttl,
        }
    }
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl<V> Cache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `capacity` entries (0 = unlimited).
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                metrics: CacheMetrics::new(),
            })),
            capacity,
            default_ttl,
        }
    }

    // == Set ==
    /// Stores `value` under `key` with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Stores `value` under `key`, expiring after `ttl`.
    ///
    /// Re-setting an existing key refreshes its value, expiry and recency in
    /// place and never evicts. A new key arriving while the cache is full
    /// evicts the least recently used entry first.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = Entry::new(value, ttl);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = entry;
            inner.lru.touch(&key);
            return;
        }

        if self.capacity > 0 && inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner.lru.evict_oldest() {
                inner.entries.remove(&oldest);
                inner.metrics.record_eviction();
            }
        }

        inner.lru.touch(&key);
        inner.entries.insert(key, entry);
    }

    // == Delete ==
    /// Removes `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.entries.remove(key).is_some() {
            inner.lru.remove(key);
            true
        } else {
            false
        }
    }

    /// Removes every key starting with `prefix`. Returns the number removed.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        self.delete_matching(|key| key.starts_with(prefix))
    }

    /// Removes every key ending with `suffix`. Returns the number removed.
    pub fn delete_suffix(&self, suffix: &str) -> usize {
        self.delete_matching(|key| key.ends_with(suffix))
    }

    // Linear scan; fine at the few-thousand-entry sizes these caches run at.
    fn delete_matching(&self, matches: impl Fn(&str) -> bool) -> usize {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let doomed: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| matches(key.as_str()))
            .cloned()
            .collect();

        for key in &doomed {
            inner.entries.remove(key);
            inner.lru.remove(key);
        }

        doomed.len()
    }

    // == Clear ==
    /// Drops every entry. Metrics are left untouched.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.entries.clear();
        guard.lru.clear();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, counting them as expirations.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.remove(key);
            inner.lru.remove(key);
        }

        inner.metrics.record_expirations(expired.len() as u64);
        expired.len()
    }

    // == Introspection ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Live (non-expired) keys, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let guard = self.inner.lock();

        guard
            .lru
            .iter_recent()
            .filter(|key| {
                guard
                    .entries
                    .get(*key)
                    .is_some_and(|entry| !entry.is_expired_at(now))
            })
            .map(str::to_string)
            .collect()
    }

    /// Time left before `key` expires, without touching recency or metrics.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(Entry::ttl_remaining)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Metrics ==
    pub fn metrics(&self) -> CacheMetrics {
        self.inner.lock().metrics
    }

    pub fn reset_metrics(&self) {
        self.inner.lock().metrics = CacheMetrics::new();
    }

    /// Size, capacity and counters in one consistent snapshot.
    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock();
        CacheStats::new(guard.entries.len(), self.capacity, guard.metrics)
    }
}

impl<V: Clone> Cache<V> {
    // == Get ==
    /// Returns a clone of the live value under `key`.
    ///
    /// A hit promotes the entry to most recently used. An expired entry is
    /// removed on sight and counted as both a miss and an expiration.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            None => {
                inner.metrics.record_miss();
                return None;
            }
            Some(entry) => entry.is_expired_at(now),
        };

        if expired {
            inner.entries.remove(key);
            inner.lru.remove(key);
            inner.metrics.record_miss();
            inner.metrics.record_expirations(1);
            return None;
        }

        inner.metrics.record_hit();
        inner.lru.touch(key);
        inner.entries.get(key).map(|entry| entry.value.clone())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn store(capacity: usize) -> Cache<String> {
        Cache::new(capacity, Duration::from_secs(300))
    }

    #[test]
    fn test_store_new() {
        let cache = store(100);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 100);
    }

    #[test]
    fn test_store_set_and_get() {
        let cache = store(100);

        cache.set("key1", "value1".to_string());

        assert_eq!(cache.get("key1").as_deref(), Some("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent_is_a_miss() {
        let cache = store(100);

        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.metrics().misses, 1);
        assert_eq!(cache.metrics().expirations, 0);
    }

    #[test]
    fn test_store_delete() {
        let cache = store(100);

        cache.set("key1", "value1".to_string());

        assert!(cache.delete("key1"));
        assert!(!cache.delete("key1"));
        assert!(cache.is_empty());
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn test_store_overwrite() {
        let cache = store(100);

        cache.set("key1", "value1".to_string());
        cache.set("key1", "value2".to_string());

        assert_eq!(cache.get("key1").as_deref(), Some("value2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_overwrite_refreshes_expiry() {
        let cache = store(1);

        cache.set_with_ttl("k", "1".to_string(), Duration::from_millis(30));
        cache.set("k", "2".to_string());
        sleep(Duration::from_millis(80));

        assert_eq!(cache.get("k").as_deref(), Some("2"));
        let metrics = cache.metrics();
        assert_eq!(metrics.evictions, 0);
        assert_eq!(metrics.expirations, 0);
    }

    #[test]
    fn test_store_ttl_remaining_is_side_effect_free() {
        let cache = store(100);
        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(10));
        cache.set_with_ttl("gone", "v".to_string(), Duration::ZERO);

        let ttl = cache.ttl_remaining("k").unwrap();
        assert!(ttl <= Duration::from_secs(10));
        assert!(ttl > Duration::from_secs(9));
        assert!(cache.ttl_remaining("gone").is_none());
        assert!(cache.ttl_remaining("missing").is_none());

        assert_eq!(cache.metrics(), CacheMetrics::new());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_store_lru_eviction_respects_reads() {
        let cache = store(3);

        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("c", "3".to_string());
        assert!(cache.get("a").is_some());
        cache.set("d", "4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_store_update_at_capacity_never_evicts() {
        let cache = store(2);

        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "updated".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.metrics().evictions, 0);
        // The update promoted `a`, so `b` is now the tail
        cache.set("c", "3".to_string());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("updated"));
    }

    #[test]
    fn test_store_zero_capacity_is_unlimited() {
        let cache = store(0);

        for i in 0..500 {
            cache.set(format!("key{i}"), i.to_string());
        }

        assert_eq!(cache.len(), 500);
        assert_eq!(cache.metrics().evictions, 0);
    }

    #[test]
    fn test_store_ttl_expiration() {
        let cache = store(100);

        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(50));
        assert!(cache.get("k").is_some());

        sleep(Duration::from_millis(100));

        assert!(cache.get("k").is_none());
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.expirations, 1);
        // Lazily removed on read
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let cache = store(100);

        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(50));
        cache.set_with_ttl("long", "v".to_string(), Duration::from_secs(60));

        sleep(Duration::from_millis(100));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().expirations, 1);
        assert!(cache.get("long").is_some());
    }

    #[test]
    fn test_store_cleanup_reports_single_expired_entry() {
        let cache = store(100);

        cache.set_with_ttl("k", "v".to_string(), Duration::from_millis(50));
        sleep(Duration::from_millis(100));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_store_keys_skip_expired() {
        let cache = store(100);

        cache.set("a", "1".to_string());
        cache.set_with_ttl("gone", "x".to_string(), Duration::ZERO);
        cache.set("b", "2".to_string());

        assert_eq!(cache.keys(), vec!["b".to_string(), "a".to_string()]);
        // keys() is read-only: the expired entry is still stored
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_store_delete_prefix_and_suffix() {
        let cache = store(100);

        cache.set("u1:p1", "x".to_string());
        cache.set("u1:p2", "x".to_string());
        cache.set("u2:p1", "x".to_string());

        assert_eq!(cache.delete_prefix("u1:"), 2);
        assert_eq!(cache.keys(), vec!["u2:p1".to_string()]);

        assert_eq!(cache.delete_suffix(":p1"), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.delete_suffix(":p1"), 0);
    }

    #[test]
    fn test_store_clear_keeps_metrics() {
        let cache = store(100);

        cache.set("a", "1".to_string());
        cache.get("a");
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.keys().is_empty());
        assert_eq!(cache.metrics().hits, 1);

        cache.reset_metrics();
        assert_eq!(cache.metrics(), CacheMetrics::new());
    }

    #[test]
    fn test_store_hit_rate() {
        let cache = store(100);
        assert_eq!(cache.metrics().hit_rate(), 0.0);

        cache.set("a", "1".to_string());
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        assert!((cache.metrics().hit_rate() - 66.67).abs() < 0.01);
    }

    #[test]
    fn test_store_clones_share_storage() {
        let cache = store(100);
        let other = cache.clone();

        other.set("shared", "yes".to_string());

        assert_eq!(cache.get("shared").as_deref(), Some("yes"));
    }

    #[test]
    fn test_store_concurrent_writers_respect_capacity() {
        let cache: Cache<usize> = Cache::new(64, Duration::from_secs(60));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        cache.set(format!("t{t}-{i}"), i);
                        cache.get(&format!("t{t}-{}", i / 2));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 64);
        assert_eq!(cache.metrics().evictions, 8 * 500 - 64);
    }
}
