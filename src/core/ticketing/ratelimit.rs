// src/core/ticketing/ratelimit.rs

//! A sliding-window rate limiter bounding outbound ticketing requests
//! (default 50 req/min).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct SlidingWindowLimiter {
    max_per_window: u32,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindowLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            timestamps: VecDeque::new(),
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns the duration the caller must wait before the next request is
    /// allowed, or `None` if one may proceed immediately. Does not itself
    /// record the request — call `record` after waiting.
    pub fn wait_time(&mut self, now: Instant) -> Option<Duration> {
        self.evict_expired(now);
        if (self.timestamps.len() as u32) < self.max_per_window {
            return None;
        }
        let oldest = *self.timestamps.front().expect("len >= max_per_window > 0");
        Some(self.window - now.duration_since(oldest))
    }

    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_cap_then_blocks() {
        let mut limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(limiter.wait_time(t0).is_none());
        limiter.record(t0);
        assert!(limiter.wait_time(t0).is_none());
        limiter.record(t0);
        assert!(limiter.wait_time(t0).is_some());
    }

    #[test]
    fn window_slides_past_old_entries() {
        let mut limiter = SlidingWindowLimiter::new(1, Duration::from_millis(50));
        let t0 = Instant::now();
        limiter.record(t0);
        assert!(limiter.wait_time(t0).is_some());
        let later = t0 + Duration::from_millis(60);
        assert!(limiter.wait_time(later).is_none());
    }
}
