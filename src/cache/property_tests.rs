//! Property-Based Tests
//!
//! Uses proptest to check the cache against a simple LRU model, and the
//! bucket and backoff arithmetic against their bounds.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::ratelimit::TokenBucket;
use crate::retry::{RetryPolicy, MIN_DELAY};

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Small key space so sequences revisit keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: u32 },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

/// Reference LRU: most recent first.
#[derive(Default)]
struct LruModel {
    order: Vec<(String, u32)>,
}

impl LruModel {
    fn promote(&mut self, index: usize) {
        let entry = self.order.remove(index);
        self.order.insert(0, entry);
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.order.iter().position(|(k, _)| k == key)
    }

    /// Returns whether an entry was evicted.
    fn set(&mut self, key: String, value: u32, capacity: usize) -> bool {
        if let Some(index) = self.position(&key) {
            self.order[index].1 = value;
            self.promote(index);
            return false;
        }
        let evicted = capacity > 0 && self.order.len() >= capacity;
        if evicted {
            self.order.pop();
        }
        self.order.insert(0, (key, value));
        evicted
    }

    fn get(&mut self, key: &str) -> Option<u32> {
        let index = self.position(key)?;
        self.promote(index);
        Some(self.order[0].1)
    }

    fn delete(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => {
                self.order.remove(index);
                true
            }
            None => false,
        }
    }

    fn keys(&self) -> Vec<String> {
        self.order.iter().map(|(k, _)| k.clone()).collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Values, recency order and every counter follow the reference LRU.
    #[test]
    fn prop_cache_matches_lru_model(
        capacity in 0usize..6,
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
    ) {
        let cache: Cache<u32> = Cache::new(capacity, TEST_TTL);
        let mut model = LruModel::default();
        let (mut hits, mut misses, mut evictions) = (0u64, 0u64, 0u64);

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    if model.set(key.clone(), value, capacity) {
                        evictions += 1;
                    }
                    cache.set(key, value);
                }
                CacheOp::Get { key } => {
                    let expected = model.get(&key);
                    if expected.is_some() { hits += 1 } else { misses += 1 }
                    prop_assert_eq!(cache.get(&key), expected);
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(cache.delete(&key), model.delete(&key));
                }
            }

            if capacity > 0 {
                prop_assert!(cache.len() <= capacity, "Capacity exceeded");
            }
        }

        prop_assert_eq!(cache.keys(), model.keys());

        let metrics = cache.metrics();
        prop_assert_eq!(metrics.hits, hits, "Hits mismatch");
        prop_assert_eq!(metrics.misses, misses, "Misses mismatch");
        prop_assert_eq!(metrics.evictions, evictions, "Evictions mismatch");
        prop_assert_eq!(metrics.expirations, 0);
    }

    // Prefix and suffix deletes remove exactly the matching keys.
    #[test]
    fn prop_prefix_and_suffix_delete_exact(
        keys in prop::collection::hash_set("[ab]{1,2}:[xy]{1,2}", 1..20),
        prefix in "[ab]{1,2}:",
        suffix in ":[xy]{1,2}",
    ) {
        let cache: Cache<()> = Cache::new(0, TEST_TTL);
        for key in &keys {
            cache.set(key.clone(), ());
        }

        let removed = cache.delete_prefix(&prefix);
        let expected: HashSet<&String> = keys.iter().filter(|k| k.starts_with(&prefix)).collect();
        prop_assert_eq!(removed, expected.len());
        prop_assert!(cache.keys().iter().all(|k| !k.starts_with(&prefix)));

        let remaining: HashSet<String> = cache.keys().into_iter().collect();
        let removed = cache.delete_suffix(&suffix);
        let expected = remaining.iter().filter(|k| k.ends_with(&suffix)).count();
        prop_assert_eq!(removed, expected);
        prop_assert_eq!(cache.len(), remaining.len() - expected);
    }

    // Only `burst` requests pass at a single instant, whatever the rate.
    #[test]
    fn prop_bucket_admits_at_most_burst(
        rate in 0.01f64..1000.0,
        burst in 1u32..50,
        requests in 1usize..100,
    ) {
        let now = Instant::now();
        let bucket = TokenBucket::new_at(rate, burst, now).unwrap();

        let mut admitted = 0usize;
        for _ in 0..requests {
            let decision = bucket.allow_at(now);
            prop_assert!(decision.remaining <= burst);
            if decision.allowed {
                admitted += 1;
                prop_assert!(decision.retry_after.is_none());
            } else {
                prop_assert!(decision.retry_after.unwrap() > Duration::ZERO);
            }
        }

        prop_assert_eq!(admitted, requests.min(burst as usize));
    }

    // Jittered delays stay within [1ms, max_delay * (1 + jitter)].
    #[test]
    fn prop_delay_within_bounds(
        initial_ms in 1u64..1_000,
        extra_ms in 0u64..10_000,
        multiplier in 0.5f64..4.0,
        jitter in 0.0f64..=1.0,
        attempt in 0u32..64,
    ) {
        let max_delay = Duration::from_millis(initial_ms + extra_ms);
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(initial_ms))
            .max_delay(max_delay)
            .multiplier(multiplier)
            .jitter_factor(jitter)
            .build()
            .unwrap();

        let delay = policy.calculate_delay(attempt);
        prop_assert!(delay >= MIN_DELAY);
        prop_assert!(delay.as_secs_f64() <= max_delay.as_secs_f64() * (1.0 + jitter) + 1e-6);
        prop_assert!(policy.base_delay(attempt) <= max_delay);
    }
}
