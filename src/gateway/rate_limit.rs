//! Per-connection `match:input` rate limiting.
//!
//! Directly modeled on `rate_limit::RateLimitEntry`: a
//! window-start timestamp plus a counter, lazily reset once the window has
//! elapsed rather than on a background timer.

use std::time::{Duration, Instant};

/// Fixed one-second window, matching the "30 inputs/sec" limit.
const WINDOW: Duration = Duration::from_secs(1);

pub struct InputRateLimiter {
    limit: u32,
    count: u32,
    window_start: Instant,
}

impl InputRateLimiter {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self { limit, count: 0, window_start: Instant::now() }
    }

    fn maybe_reset_window(&mut self) {
        if self.window_start.elapsed() >= WINDOW {
            self.count = 0;
            self.window_start = Instant::now();
        }
    }

    /// Checks and, on success, consumes one slot from the current window.
    pub fn try_acquire(&mut self) -> bool {
        self.maybe_reset_window();
        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_per_window() {
        let mut limiter = InputRateLimiter::new(3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}
