//! Fibonacci reconnect backoff.
//!
//! Base delays follow `min, min, 2min, 3min, 5min, ...` capped at `max`; each
//! returned delay is the base scaled by a random factor in `1 ± jitter`.

use std::time::Duration;

use rand::Rng;
use uncorded_common::constants::{BACKOFF_JITTER, BACKOFF_MAX_DELAY_MS, BACKOFF_MIN_DELAY_MS};

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the base delay added or subtracted at random (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(BACKOFF_MIN_DELAY_MS),
            max_delay: Duration::from_millis(BACKOFF_MAX_DELAY_MS),
            jitter: BACKOFF_JITTER,
        }
    }
}

impl BackoffConfig {
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    config: BackoffConfig,
    previous: Duration,
    current: Duration,
    attempts: u32,
}

impl FibonacciBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let max_delay = config.max_delay.max(config.min_delay);
        let jitter = config.jitter.clamp(0.0, 1.0);
        let config = BackoffConfig {
            max_delay,
            jitter,
            ..config
        };
        Self {
            config,
            previous: Duration::ZERO,
            current: config.min_delay,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        let next = (self.previous + self.current).min(self.config.max_delay);
        self.previous = self.current;
        self.current = next;
        self.attempts += 1;
        self.jittered(base)
    }

    /// Back to the minimum delay (called on every successful connection)
    pub fn reset(&mut self) {
        self.previous = Duration::ZERO;
        self.current = self.config.min_delay;
        self.attempts = 0;
    }

    /// Consecutive delays handed out since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.config.jitter == 0.0 {
            return base;
        }
        let jitter = self.config.jitter;
        let factor = 1.0 + rand::rng().random_range(-jitter..=jitter);
        base.mul_f64(factor)
    }
}
