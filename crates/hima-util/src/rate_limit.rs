//! Rate limiting utilities

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Simple token-bucket rate limiter, one bucket per key.
///
/// Used to cap how often change notifications may trigger a group refresh.
#[derive(Debug)]
pub struct RateLimiter<K> {
    /// Maximum tokens (refreshes) per bucket
    max_tokens: u32,
    /// How often tokens are replenished
    refill_interval: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests allowed per interval
    /// * `interval` - Time interval for the limit
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            buckets: HashMap::new(),
        }
    }

    /// Check if a request should be allowed for the given key
    ///
    /// Returns `true` if allowed, `false` if rate limited
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_millis() / self.refill_interval.as_millis().max(1)) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(intervals.saturating_mul(self.max_tokens))
                .min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupId;

    #[test]
    fn test_rate_limiter_allows_within_limit() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let group = GroupId::new("g");

        for _ in 0..5 {
            assert!(limiter.check(&group));
        }

        assert!(!limiter.check(&group));
    }

    #[test]
    fn test_rate_limiter_different_keys() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let group1 = GroupId::new("g1");
        let group2 = GroupId::new("g2");

        assert!(limiter.check(&group1));
        assert!(limiter.check(&group1));
        assert!(!limiter.check(&group1));

        assert!(limiter.check(&group2));
        assert!(limiter.check(&group2));
    }

    #[test]
    fn test_rate_limiter_refills() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));
        let group = GroupId::new("g");
        let start = Instant::now();

        assert!(limiter.check_at(&group, start));
        assert!(!limiter.check_at(&group, start + Duration::from_millis(500)));
        assert!(limiter.check_at(&group, start + Duration::from_millis(1500)));
    }
}
