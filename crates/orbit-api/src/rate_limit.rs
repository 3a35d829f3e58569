use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

#[derive(Debug, Clone)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// Fixed-window request counter keyed by caller-supplied strings.
///
/// Owned by the app state and injected into handlers, never a module-level
/// singleton. Window edges can admit up to 2x the limit in pathological
/// timing; that is acceptable for abuse mitigation, not quota enforcement.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn consume(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.consume_at(key, limit, window, Instant::now())
    }

    /// Clock-explicit variant of [`consume`](Self::consume) so tests can
    /// drive the window deterministically.
    pub fn consume_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateDecision {
        // Nothing panics while the lock is held, so a poisoned map still
        // holds consistent data; keep counting rather than failing open.
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match buckets.get_mut(key) {
            Some(bucket) if bucket.reset_at > now => {
                if bucket.count >= limit {
                    return RateDecision {
                        allowed: false,
                        retry_after_secs: retry_after(bucket.reset_at, now),
                    };
                }
                bucket.count += 1;
                RateDecision {
                    allowed: true,
                    retry_after_secs: 0,
                }
            }
            _ => {
                buckets.insert(
                    key.to_string(),
                    Bucket {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                RateDecision {
                    allowed: true,
                    retry_after_secs: 0,
                }
            }
        }
    }

    /// Drop buckets whose window has elapsed. Keys are caller-controlled
    /// (forwarded IPs), so without a periodic sweep the map only grows.
    pub fn purge_expired(&self) {
        self.purge_expired_at(Instant::now());
    }

    fn purge_expired_at(&self, now: Instant) {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        buckets.retain(|_, bucket| bucket.reset_at > now);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds until the window resets, rounded up, floored at 1.
fn retry_after(reset_at: Instant, now: Instant) -> u64 {
    let remaining = reset_at.duration_since(now);
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    secs.max(1)
}

/// Rate-limit key for an inbound request: scope plus the first
/// `x-forwarded-for` entry, or "unknown" when no proxy header is present.
pub fn client_key(scope: &str, headers: &HeaderMap) -> String {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown");
    format!("{scope}:{ip}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn allows_exactly_limit_within_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.consume_at("k", 5, WINDOW, start).allowed);
        }

        let denied = limiter.consume_at("k", 5, WINDOW, start);
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs >= 1);
    }

    #[test]
    fn window_elapse_resets_the_count() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.consume_at("k", 1, WINDOW, start).allowed);
        assert!(!limiter.consume_at("k", 1, WINDOW, start).allowed);

        assert!(limiter.consume_at("k", 1, WINDOW, start + WINDOW).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.consume_at("a", 1, WINDOW, start).allowed);
        assert!(!limiter.consume_at("a", 1, WINDOW, start).allowed);
        assert!(limiter.consume_at("b", 1, WINDOW, start).allowed);
    }

    #[test]
    fn retry_after_rounds_up_and_floors_at_one() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.consume_at("k", 1, WINDOW, start).allowed);

        let late = start + Duration::from_millis(59_500);
        let denied = limiter.consume_at("k", 1, WINDOW, late);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 1);

        let nearly_over = start + Duration::from_nanos(WINDOW.as_nanos() as u64 - 1);
        let denied = limiter.consume_at("k", 1, WINDOW, nearly_over);
        assert_eq!(denied.retry_after_secs, 1);
    }

    #[test]
    fn purge_drops_expired_buckets_but_keeps_live_ones() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        assert!(limiter.consume_at("old", 1, WINDOW, start).allowed);
        assert!(limiter.consume_at("live", 1, WINDOW, start + WINDOW / 2).allowed);

        limiter.purge_expired_at(start + WINDOW);

        // The expired bucket is gone: a consume back at `start` starts a
        // fresh window instead of hitting the exhausted count.
        assert!(limiter.consume_at("old", 1, WINDOW, start).allowed);
        // The live bucket survived the sweep with its count intact.
        assert!(!limiter.consume_at("live", 1, WINDOW, start + WINDOW / 2).allowed);
    }

    #[test]
    fn client_key_prefers_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_key("auth", &headers), "auth:203.0.113.9");

        let empty = HeaderMap::new();
        assert_eq!(client_key("auth", &empty), "auth:unknown");
    }
}
