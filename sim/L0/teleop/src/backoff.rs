//! Exponential backoff for transient device errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const BACKOFF_MULTIPLIER: u32 = 2;

/// Longest uninterrupted sleep while waiting out a backoff.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Delay schedule: `initial`, doubled per consecutive failure, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// New schedule. `max` below `initial` is raised to `initial`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            attempt: 0,
        }
    }

    /// Delay for the next retry; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let factor = BACKOFF_MULTIPLIER.saturating_pow(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Consecutive failures so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Back to the initial delay after a success.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Sleep for `delay`, waking early once `running` clears.
///
/// Returns `false` if interrupted.
pub fn wait_while_running(delay: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if !running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}
