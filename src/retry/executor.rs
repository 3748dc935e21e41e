//! Retry loop.
//!
//! Runs a unit of work up to `max_retries + 1` times, sleeping a jittered
//! exponential backoff between retryable failures. No lock is held while the
//! work runs or while waiting, and the caller's cancellation token is checked
//! before every attempt, after every failure, and throughout every wait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::RetryError;
use crate::retry::{NoopObserver, RetryEvent, RetryObserver, RetryPolicy};

// == Attempt Failure ==
/// A single failed attempt: its outcome code and the underlying cause.
#[derive(Debug)]
pub struct AttemptFailure {
    pub code: u16,
    pub error: anyhow::Error,
}

impl AttemptFailure {
    pub fn new(code: u16, error: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }

    /// Failure with a plain message as its cause.
    pub fn msg<M>(code: u16, message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(code, anyhow::Error::msg(message))
    }
}

// == Retry Failure ==
/// Failure from [`Retrier::execute_with_result`], keeping the last value the
/// work produced (`None` only if it never ran).
#[derive(Debug)]
pub struct RetryFailure<T> {
    pub last: Option<T>,
    pub error: RetryError,
}

impl<T> fmt::Display for RetryFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<T: fmt::Debug> std::error::Error for RetryFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// == Retrier ==
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Retrier {
    /// Creates a retrier that reports nothing.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Routes retry events to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_retryable(&self, code: u16) -> bool {
        self.policy.is_retryable(code)
    }

    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.policy.calculate_delay(attempt)
    }

    // == Execute ==
    /// Runs `operation` until it succeeds, fails non-retryably, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// # Errors
    /// - [`RetryError::NonRetryable`] on a code outside the retryable set
    /// - [`RetryError::Exhausted`] when every attempt failed retryably
    /// - [`RetryError::Cancelled`] when `cancel` fired; this wins over the others
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptFailure>>,
    {
        self.run(cancel, || {
            let attempt = operation();
            async move { attempt.await.map_err(|failure| (None, failure)) }
        })
        .await
        .map_err(|(_, error)| error)
    }

    /// Like [`Retrier::execute`], but every attempt produces a value, success or
    /// not, and the most recent one is handed back on failure.
    ///
    /// # Errors
    /// Same as [`Retrier::execute`], wrapped in a [`RetryFailure`] carrying
    /// the last produced value.
    pub async fn execute_with_result<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryFailure<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = (T, Result<(), AttemptFailure>)>,
    {
        self.run(cancel, || {
            let attempt = operation();
            async move {
                match attempt.await {
                    (value, Ok(())) => Ok(value),
                    (value, Err(failure)) => Err((Some(value), failure)),
                }
            }
        })
        .await
        .map_err(|(last, error)| RetryFailure { last, error })
    }

    async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, (Option<T>, RetryError)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, (Option<T>, AttemptFailure)>>,
    {
        let mut last: Option<T> = None;
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err((last, RetryError::Cancelled { attempts: attempt }));
            }

            let (partial, failure) = match operation().await {
                Ok(value) => return Ok(value),
                Err(failed) => failed,
            };
            if partial.is_some() {
                last = partial;
            }

            let attempts = attempt + 1;
            if cancel.is_cancelled() {
                return Err((last, RetryError::Cancelled { attempts }));
            }

            let AttemptFailure { code, error } = failure;

            if !self.policy.is_retryable(code) || attempt >= self.policy.max_retries {
                self.observer.on_give_up(&RetryEvent {
                    attempt: attempts,
                    code,
                    delay: None,
                    error: &error,
                });

                let outcome = if self.policy.is_retryable(code) {
                    RetryError::Exhausted {
                        attempts,
                        code,
                        source: error,
                    }
                } else {
                    RetryError::NonRetryable {
                        code,
                        attempts,
                        source: error,
                    }
                };
                return Err((last, outcome));
            }

            let delay = self.policy.calculate_delay(attempt);
            self.observer.on_retry(&RetryEvent {
                attempt: attempts,
                code,
                delay: Some(delay),
                error: &error,
            });
            drop(error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err((last, RetryError::Cancelled { attempts }));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
