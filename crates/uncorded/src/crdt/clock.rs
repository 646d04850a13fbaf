//! Wall-clock sources for expiring sets.

use std::fmt::Debug;

/// Millisecond wall clock.
///
/// Expiry timestamps travel between replicas, so this is wall time rather
/// than a monotonic instant.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> i64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
