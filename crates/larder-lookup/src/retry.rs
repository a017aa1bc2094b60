//! # Retry Schedule
//!
//! Linear backoff for provider retries: attempt `n` waits `base × n`.
//!
//! ```text
//! base = 350ms, max_attempts = 3
//!
//! attempt 1 ──✗── wait 350ms ── attempt 2 ──✗── wait 700ms ── attempt 3 ──✗── give up
//! ```
//!
//! Implements [`backoff::backoff::Backoff`] so callers drive it the same way
//! they would drive an `ExponentialBackoff`.

use backoff::backoff::Backoff;
use std::time::Duration;

/// Linear retry schedule bounded by a number of attempts.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    max_attempts: u32,
    /// Attempts already made (1 after the first failure is reported).
    attempt: u32,
}

impl LinearBackoff {
    /// Creates a schedule allowing `max_attempts` attempts in total.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        LinearBackoff {
            base,
            max_attempts: max_attempts.max(1),
            attempt: 1,
        }
    }

    /// Number of the attempt about to run, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 1;
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.base.saturating_mul(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}
