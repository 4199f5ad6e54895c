//! Per-principal token-bucket rate limiting, applied after authentication so
//! the bucket key is the authenticated principal rather than a spoofable
//! client-supplied field.
use std::time::Instant;

use dashmap::DashMap;
use tonic::Status;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    rate_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rate: u32, burst: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rate_per_sec: f64::from(rate),
            burst: f64::from(burst),
        }
    }

    /// Returns `Ok(())` if the call may proceed, consuming one token, or a
    /// `ResourceExhausted` status if the principal's bucket is empty.
    pub fn check(&self, principal: &str) -> Result<(), Status> {
        let now = Instant::now();
        let mut entry = self.buckets.entry(principal.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.rate_per_sec).min(self.burst);
        entry.last_refill = now;

        if entry.tokens < 1.0 {
            return Err(Status::resource_exhausted("rate limit exceeded"));
        }
        entry.tokens -= 1.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_refuses() {
        let limiter = RateLimiter::new(1, 2);
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());
    }

    #[test]
    fn buckets_are_per_principal() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("bob").is_ok());
    }
}
