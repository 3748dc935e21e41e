//! Retry policy with exponential backoff.
//!
//! Pure configuration plus the two decisions a retry loop needs: whether a
//! failure code is worth retrying, and how long to wait before the next try.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Floor applied to every computed delay.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Codes retried by default: timeouts, throttling and transient upstream failures.
pub const DEFAULT_RETRYABLE_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the un-jittered delay
    pub max_delay: Duration,
    /// Backoff multiplier, > 0
    pub multiplier: f64,
    /// Jitter factor in [0, 1]
    pub jitter_factor: f64,
    /// Failure codes that warrant another attempt
    pub retryable_codes: HashSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.25,
            retryable_codes: DEFAULT_RETRYABLE_CODES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a builder starting from the defaults
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Checks the invariants the delay computation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidJitter(self.jitter_factor));
        }
        if self.initial_delay.is_zero() {
            return Err(ConfigError::InvalidDelay(
                "initial delay must be non-zero".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::InvalidDelay(format!(
                "max delay {:?} is below initial delay {:?}",
                self.max_delay, self.initial_delay
            )));
        }
        Ok(())
    }

    /// Check if a failure code is retryable
    #[must_use]
    pub fn is_retryable(&self, code: u16) -> bool {
        self.retryable_codes.contains(&code)
    }

    /// Un-jittered delay before retry number `attempt + 1` (0-indexed).
    ///
    /// `min(max_delay, initial_delay * multiplier^attempt)`, built by repeated
    /// multiplication so every platform lands on the same value.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_nanos() as f64;
        let mut delay = self.initial_delay.as_nanos() as f64;

        for _ in 0..attempt {
            delay *= self.multiplier;
            if delay >= max {
                return self.max_delay;
            }
            // Flat backoff, or shrunk below a nanosecond: nothing left to compute
            if self.multiplier == 1.0 || delay < 1.0 {
                break;
            }
        }

        if delay >= max {
            self.max_delay
        } else {
            Duration::from_nanos(delay.round() as u64)
        }
    }

    /// Jittered delay for `attempt` using the thread-local RNG.
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.calculate_delay_with(attempt, &mut rand::thread_rng())
    }

    /// Jittered delay for `attempt`, drawing jitter from `rng`.
    ///
    /// The result lies in `[1ms, max_delay * (1 + jitter_factor)]`.
    pub fn calculate_delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.base_delay(attempt).as_nanos() as f64;

        let spread = delay * self.jitter_factor;
        let jitter = if spread > 0.0 {
            rng.gen_range(-spread..=spread)
        } else {
            0.0
        };

        Duration::from_nanos((delay + jitter).max(0.0).round() as u64).max(MIN_DELAY)
    }
}

/// Builder for retry policy
#[derive(Debug, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn jitter_factor(mut self, jitter: f64) -> Self {
        self.policy.jitter_factor = jitter;
        self
    }

    /// Replace the retryable code set
    #[must_use]
    pub fn retryable_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.policy.retryable_codes = codes.into_iter().collect();
        self
    }

    /// Build the policy, rejecting invalid combinations
    pub fn build(self) -> Result<RetryPolicy, ConfigError> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
