//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the caches.
//!
//! # Tasks
//! - Sweep: removes expired cache entries at a fixed interval until stopped

mod sweep;

pub use sweep::{spawn_sweep_task, Sweep, SweepHandle, MAX_SWEEP_INTERVAL};
