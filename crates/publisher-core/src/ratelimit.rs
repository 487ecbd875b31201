//! Token-bucket rate limiter for listing requests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A greedy token bucket: the bucket starts full and refills continuously,
/// proportional to elapsed time, rather than in whole-period steps.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: u32,
    refill_amount: u32,
    refill_interval: Duration,
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_amount: u32, refill_interval: Duration) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
            capacity,
            refill_amount,
            refill_interval,
        }
    }

    /// Take `n` tokens if available. Never blocks.
    pub fn try_consume(&self, n: u32) -> bool {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();

        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refill = elapsed / self.refill_interval.as_secs_f64() * f64::from(self.refill_amount);
        state.tokens = (state.tokens + refill).min(f64::from(self.capacity));
        state.last_refill = now;

        if state.tokens >= f64::from(n) {
            state.tokens -= f64::from(n);
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
    fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(20, 20, Duration::from_secs(60));
        for _ in 0..20 {
            assert!(limiter.try_consume(1));
        }
        assert!(!limiter.try_consume(1));
    }

    #[test]
    fn test_greedy_refill() {
        let limiter = RateLimiter::new(10, 10, Duration::from_millis(100));
        assert!(limiter.try_consume(10));
        assert!(!limiter.try_consume(1));
        // half the interval restores roughly half the tokens
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.try_consume(4));
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let limiter = RateLimiter::new(5, 100, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.try_consume(5));
        assert!(!limiter.try_consume(1));
    }
}
