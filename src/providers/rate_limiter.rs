//! Token bucket limiting outbound calls to paid upstream APIs

use std::time::{Duration, Instant};

/// Token bucket refilled continuously at `rate_per_second`
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: u32) -> Self {
        let rate = rate_per_second.max(1);
        Self {
            capacity: rate,
            tokens: rate as f64,
            refill_rate: rate as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;
    }

    /// Take one token; false when the bucket is empty
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait before the next token is available
    pub fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_drains_at_capacity() {
        let mut bucket = TokenBucket::new(5);
        for _ in 0..5 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        assert!(bucket.time_until_available() > Duration::ZERO);
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let mut bucket = TokenBucket::new(100);
        for _ in 0..100 {
            bucket.try_acquire();
        }
        assert!(!bucket.try_acquire());

        // 100/s over 100ms is ~10 tokens
        bucket.last_refill = Instant::now() - Duration::from_millis(100);
        for _ in 0..9 {
            assert!(bucket.try_acquire());
        }
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let mut bucket = TokenBucket::new(0);
        assert!(bucket.try_acquire());
    }
}
