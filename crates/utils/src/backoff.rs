//! Randomized fixed backoff

use rand::Rng;
use std::time::Duration;

/// A fixed base delay plus uniform random jitter
///
/// Writers contending for the same lock file pick different jitter so they
/// stop colliding after a few rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max_jitter: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max_jitter: Duration) -> Self {
        Self { base, max_jitter }
    }

    /// Draw the next delay in `base..=base + max_jitter`
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base;
        }
        self.base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    /// Block the current thread for one drawn delay
    pub fn sleep(&self) {
        std::thread::sleep(self.next_delay());
    }
}
