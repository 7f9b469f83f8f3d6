use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Fixed-window request counter keyed by client and route. Timestamps
/// older than the window age out on each check, so an idle bucket costs
/// nothing beyond its map entry.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<(String, String), VecDeque<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record one request for `client` on `route`; returns whether it is
    /// allowed and how many requests remain in the window.
    pub fn allow(&self, client: &str, route: &str) -> (bool, u32) {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((client.to_owned(), route.to_owned()))
            .or_default();

        while let Some(oldest) = bucket.front() {
            if now.duration_since(*oldest) < self.window {
                break;
            }
            bucket.pop_front();
        }

        if bucket.len() as u32 >= self.max_requests {
            return (false, 0);
        }

        bucket.push_back(now);
        (true, self.max_requests - bucket.len() as u32)
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_the_window_limit() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 2);
        assert!(limiter.allow("10.0.0.1", "/api/projects").0);
        assert!(limiter.allow("10.0.0.1", "/api/projects").0);
        assert!(!limiter.allow("10.0.0.1", "/api/projects").0);
        // Other clients and routes keep their own buckets.
        assert!(limiter.allow("10.0.0.2", "/api/projects").0);
        assert!(limiter.allow("10.0.0.1", "/api/securities").0);
    }

    #[test]
    fn reports_remaining_capacity() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 3);
        assert_eq!(limiter.allow("c", "/r"), (true, 2));
        assert_eq!(limiter.allow("c", "/r"), (true, 1));
        assert_eq!(limiter.allow("c", "/r"), (true, 0));
        assert_eq!(limiter.allow("c", "/r"), (false, 0));
    }
}
