//! Sliding-window admission control for group messages.
//!
//! Bounds how many messages per period get forwarded into the filter engine;
//! denied messages are dropped from moderation (load shedding, not queued).

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, period: Duration) -> Self {
        let max_calls = max_calls.max(1) as usize;
        Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&self, now: Instant) -> bool {
        let mut calls = lock(&self.calls);

        if calls.len() < self.max_calls {
            calls.push_back(now);
            return true;
        }

        // Window full: admit only by evicting a timestamp at least one period old.
        if let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= self.period {
                calls.pop_front();
                calls.push_back(now);
                return true;
            }
        }

        false
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_within_one_instant() {
        let rl = RateLimiter::new(2, Duration::from_secs(1));
        let now = Instant::now();

        assert!(rl.allow_at(now));
        assert!(rl.allow_at(now));
        assert!(!rl.allow_at(now));
    }

    #[test]
    fn evicts_oldest_after_period() {
        let rl = RateLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();

        assert!(rl.allow_at(start));
        assert!(rl.allow_at(start));
        assert!(!rl.allow_at(start));

        let later = start + Duration::from_secs(1);
        assert!(rl.allow_at(later));
        // Both stale entries are evictable at `later`; after that the window
        // holds only fresh timestamps and fills up again.
        assert!(rl.allow_at(later));
        assert!(!rl.allow_at(later));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let rl = RateLimiter::new(0, Duration::from_secs(1));
        let now = Instant::now();
        assert!(rl.allow_at(now));
        assert!(!rl.allow_at(now));
    }
}
