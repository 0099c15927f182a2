//! Token bucket rate limiting per client IP.
//!
//! A bucket left alone long enough to refill completely is indistinguishable
//! from a new one, so such buckets are swept every `SWEEP_EVERY` checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::http::RequestContext;
use crate::middleware::pipeline::{Next, StageResult};
use crate::observability::metrics;

const SWEEP_EVERY: u64 = 1024;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client buckets for one route's `rate_limit` stage.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    rate: f64,
    burst: f64,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rate: config.requests_per_second as f64,
            burst: config.burst_size as f64,
            checks: AtomicU64::new(0),
        }
    }

    /// Take one token for `client`. Returns false when the bucket is empty.
    pub fn check(&self, client: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.evict_idle(Instant::now());
        }

        let mut bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.rate)
    }

    /// Drop buckets that would be full again by `now`.
    pub fn evict_idle(&self, now: Instant) {
        if self.rate <= 0.0 {
            return;
        }
        let refill = Duration::from_secs_f64(self.burst / self.rate);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < refill);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate limit buckets");
        }
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    pub async fn process(&self, request: Request<Body>, next: Next<'_>) -> StageResult {
        let (client, route) = match RequestContext::of(&request) {
            Some(ctx) => (
                ctx.client_addr
                    .map(|addr| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                ctx.route.name.clone(),
            ),
            None => ("unknown".to_string(), String::new()),
        };

        if !self.check(&client) {
            tracing::warn!(client = %client, route = %route, "Rate limit exceeded");
            metrics::record_rate_limited(&route);
            return Err(GatewayError::RateLimited { client });
        }
        next.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_reject() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1,
            burst_size: 3,
        });

        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        // Buckets are per client.
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn refilled_buckets_are_evicted() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 10,
            burst_size: 20,
        });
        for i in 0..50 {
            limiter.check(&format!("10.0.0.{i}"));
        }
        assert_eq!(limiter.tracked_clients(), 50);

        // Still refilling: nothing goes.
        limiter.evict_idle(Instant::now());
        assert_eq!(limiter.tracked_clients(), 50);

        // 20 tokens at 10/s refill within 2s.
        limiter.evict_idle(Instant::now() + Duration::from_secs(3));
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn periodic_sweep_bounds_the_map() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1_000_000,
            burst_size: 1,
        });
        for i in 0..(SWEEP_EVERY * 4) {
            limiter.check(&format!("client-{i}"));
        }
        assert!(limiter.tracked_clients() < (SWEEP_EVERY * 4) as usize);
    }
}
