//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Longest period the sweep honours; longer intervals are clamped to it.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

// == Sweep ==
/// Anything that can drop its expired entries in one pass.
pub trait Sweep: Send + Sync + 'static {
    /// Removes expired entries, returning how many were dropped.
    fn sweep(&self) -> usize;
}

impl<V: Send + 'static> Sweep for Cache<V> {
    fn sweep(&self) -> usize {
        self.cleanup()
    }
}

// == Sweep Handle ==
/// Owner of a running sweep task.
///
/// Dropping the handle cancels the task without waiting for it;
/// [`SweepHandle::stop`] cancels and waits.
#[derive(Debug)]
pub struct SweepHandle {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    /// Cancels the task and waits for it to exit.
    ///
    /// The loop checks for cancellation between sweeps and never blocks inside
    /// one, so this returns after at most one in-flight sweep.
    pub async fn stop(self) {
        let SweepHandle { guard, handle } = self;
        drop(guard);

        if let Err(err) = handle.await {
            warn!("Sweep task ended abnormally: {}", err);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a task that calls [`Sweep::sweep`] on `target` every `every`.
///
/// The first sweep runs one full interval after spawning. Intervals beyond
/// [`MAX_SWEEP_INTERVAL`] are clamped to it. Must be called from within a
/// Tokio runtime.
///
/// # Example
/// ```ignore
/// let cache: Cache<String> = Cache::new(1000, Duration::from_secs(300));
/// let sweeper = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweeper.stop().await;
/// ```
pub fn spawn_sweep_task<S: Sweep>(target: S, every: Duration) -> SweepHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let every = every.min(MAX_SWEEP_INTERVAL);

    let handle = tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {:?}", every);

        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = target.sweep();
                    if removed > 0 {
                        info!("Expiry sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Expiry sweep: no expired entries found");
                    }
                }
            }
        }

        info!("Expiry sweep stopped");
    });

    SweepHandle {
        guard: cancel.drop_guard(),
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingSweep {
        runs: Arc<AtomicUsize>,
    }

    impl Sweep for CountingSweep {
        fn sweep(&self) -> usize {
            self.runs.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let cache: Cache<String> = Cache::new(100, Duration::from_secs(300));
        cache.set_with_ttl("expire_soon", "value".to_string(), Duration::from_millis(20));
        cache.set_with_ttl("long_lived", "value".to_string(), Duration::from_secs(3600));

        let sweeper = spawn_sweep_task(cache.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Removed by the sweep, not by a read
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().expirations, 1);
        assert_eq!(cache.metrics().misses, 0);
        assert!(cache.get("long_lived").is_some());

        sweeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_runs_once_per_interval() {
        let target = CountingSweep::default();
        let sweeper = spawn_sweep_task(target.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(target.runs.load(Ordering::SeqCst), 3);

        sweeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_further_sweeps() {
        let target = CountingSweep::default();
        let sweeper = spawn_sweep_task(target.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        sweeper.stop().await;
        let runs = target.runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(target.runs.load(Ordering::SeqCst), runs);
    }

    #[tokio::test]
    async fn test_stop_returns_promptly_with_long_interval() {
        let sweeper = spawn_sweep_task(CountingSweep::default(), Duration::from_secs(3600));

        let stopped =
            tokio::time::timeout(Duration::from_millis(500), sweeper.stop()).await;
        assert!(stopped.is_ok(), "stop should not wait for the next tick");
    }

    #[tokio::test]
    async fn test_huge_interval_keeps_task_alive() {
        let target = CountingSweep::default();
        let sweeper = spawn_sweep_task(target.clone(), Duration::from_secs(u64::MAX));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sweeper.is_finished());
        assert_eq!(target.runs.load(Ordering::SeqCst), 0);

        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_task() {
        let target = CountingSweep::default();
        let sweeper = spawn_sweep_task(target.clone(), Duration::from_millis(10));
        drop(sweeper);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(target.runs.load(Ordering::SeqCst), 0);
    }
}
