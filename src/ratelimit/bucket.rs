//! Token Bucket Module
//!
//! A single lazily-refilled token bucket and the admission decision it returns.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::ConfigError;

// == Rate Decision ==
/// Result of asking a bucket for one token.
///
/// Denial is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Bucket capacity
    pub limit: u32,
    /// Whole tokens left after this decision
    pub remaining: u32,
    /// Time until the bucket is full again
    pub reset_after: Duration,
    /// Set on denial: how long until a token will be available
    pub retry_after: Option<Duration>,
}

impl RateDecision {
    /// Wall-clock instant at which the bucket will be full again.
    pub fn reset_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.reset_after)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

// == Token Bucket ==
/// Token bucket with on-demand refill.
///
/// Tokens accrue continuously at `rate` per second up to `capacity`; nothing
/// runs in the background, the refill is computed whenever the bucket is
/// consulted. Each bucket has its own lock.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    // == Constructor ==
    /// Creates a full bucket holding `burst` tokens, refilled at `rate`/second.
    pub fn new(rate: f64, burst: u32) -> Result<Self, ConfigError> {
        Self::new_at(rate, burst, Instant::now())
    }

    pub fn new_at(rate: f64, burst: u32, now: Instant) -> Result<Self, ConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::InvalidRate(rate));
        }
        if burst == 0 {
            return Err(ConfigError::InvalidBurst(burst));
        }

        let capacity = f64::from(burst);
        Ok(Self {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        })
    }

    // == Allow ==
    /// Tries to take one token now.
    pub fn allow(&self) -> RateDecision {
        self.allow_at(Instant::now())
    }

    /// Tries to take one token at `now`.
    pub fn allow_at(&self, now: Instant) -> RateDecision {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateDecision {
                allowed: true,
                limit: self.limit(),
                remaining: whole_tokens(state.tokens),
                reset_after: self.time_to_full(state.tokens),
                retry_after: None,
            }
        } else {
            let deficit = (1.0 - state.tokens) / self.rate;
            let wait_ms = (deficit * 1000.0).ceil() as u64;
            RateDecision {
                allowed: false,
                limit: self.limit(),
                remaining: 0,
                reset_after: self.time_to_full(state.tokens),
                retry_after: Some(Duration::from_millis(wait_ms.saturating_add(1))),
            }
        }
    }

    // == Introspection ==
    /// Whole tokens currently available, refilling first.
    pub fn remaining(&self) -> u32 {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> u32 {
        let mut state = self.state.lock();
        self.refill(&mut state, now);
        whole_tokens(state.tokens)
    }

    /// Bucket capacity (the burst size).
    pub fn limit(&self) -> u32 {
        self.capacity as u32
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        // A caller holding an older `now` must not rewind the clock
        if now <= state.last_refill {
            return;
        }
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + self.rate * elapsed).min(self.capacity);
        state.last_refill = now;
    }

    fn time_to_full(&self, tokens: f64) -> Duration {
        let secs = (self.capacity - tokens).max(0.0) / self.rate;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

fn whole_tokens(tokens: f64) -> u32 {
    tokens.floor().max(0.0) as u32
}
