//! Minimum-spacing rate limiter for external calls.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Blocks callers so that consecutive calls are at least `interval` apart.
///
/// Callers queue on the limiter's own mutex while they wait, so waiting
/// never holds any other lock.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a call is allowed, then record it.
    ///
    /// Returns how long the caller slept.
    pub fn acquire(&self) -> Duration {
        // A poisoned limiter only means a previous caller panicked after
        // recording its call; the timestamp is still meaningful.
        let mut last_call = self
            .last_call
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let waited = match *last_call {
            Some(last) => {
                let elapsed = last.elapsed();
                if elapsed < self.interval {
                    let remaining = self.interval - elapsed;
                    thread::sleep(remaining);
                    remaining
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        *last_call = Some(Instant::now());
        waited
    }
}
