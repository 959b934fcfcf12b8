use std::{collections::HashMap, time::Duration};

use parking_lot::Mutex;
use time::OffsetDateTime;

/// Default requests-per-second rate per client identity.
pub const DEFAULT_RATE: f64 = 100.0;
/// Default burst size (maximum tokens a bucket can hold).
pub const DEFAULT_BURST: f64 = 20.0;
/// Idle buckets older than this are evicted by the sweeper.
pub const DEFAULT_IDLE_EVICTION: Duration = Duration::from_secs(10 * 60);

struct Bucket {
    tokens: f64,
    last_refill: OffsetDateTime,
}

/// A per-client-identity token bucket. Refill is linear:
/// `tokens += elapsed_seconds * rate`, capped at `burst`. Owns its own lock,
/// independent of the connection map and session map.
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
    blocked_count: std::sync::atomic::AtomicU64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            burst,
            buckets: Mutex::new(HashMap::new()),
            blocked_count: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Consumes one token for `client_id` if available. Returns `true` if
    /// the request is admitted, `false` if the client is currently blocked.
    pub fn try_admit(&self, client_id: &str) -> bool {
        let now = OffsetDateTime::now_utc();
        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(client_id.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = (now - bucket.last_refill).as_seconds_f64().max(0.0);
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            self.blocked_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            false
        }
    }

    #[must_use]
    pub fn blocked_count(&self) -> u64 {
        self.blocked_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Drops buckets untouched for longer than `idle_eviction`.
    pub fn evict_idle(&self, idle_eviction: Duration) {
        let now = OffsetDateTime::now_utc();
        let idle_secs = idle_eviction.as_secs_f64();
        self.buckets
            .lock()
            .retain(|_, bucket| (now - bucket.last_refill).as_seconds_f64() <= idle_secs);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE, DEFAULT_BURST)
    }
}
