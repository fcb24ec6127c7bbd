//! In-process sliding-window throttle.

use super::{SlidingWindow, Throttle, ThrottleDecision, ThrottleError};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Number of tracked keys above which stale windows are dropped.
const PRUNE_THRESHOLD: usize = 10_000;

/// Source of the current time in unix milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Request counts for one key.
#[derive(Debug, Default, Clone, Copy)]
struct KeyWindows {
    index: i64,
    current: u32,
    previous: u32,
}

/// Process-local throttle.
///
/// Counts are not shared between replicas, so this only stands in for the
/// Redis-backed throttle during development and in tests.
pub struct MemoryThrottle {
    window: SlidingWindow,
    clock: Clock,
    keys: Mutex<HashMap<String, KeyWindows>>,
}

impl MemoryThrottle {
    /// Create a throttle allowing `limit` requests per `window` per key.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(|| Utc::now().timestamp_millis()))
    }

    /// Create a throttle driven by a custom clock.
    pub fn with_clock(limit: u32, window: Duration, clock: Clock) -> Self {
        Self {
            window: SlidingWindow::new(limit, window),
            clock,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request for `key` at `now_ms`.
    pub async fn check_at(&self, key: &str, now_ms: i64) -> ThrottleDecision {
        let index = self.window.window_index(now_ms);
        let reset = self.window.reset_at(now_ms);
        let limit = self.window.limit;

        let mut keys = self.keys.lock().await;
        if keys.len() >= PRUNE_THRESHOLD {
            keys.retain(|_, w| w.index >= index - 1);
        }

        let entry = keys.entry(key.to_string()).or_default();
        if entry.index != index {
            entry.previous = if entry.index == index - 1 {
                entry.current
            } else {
                0
            };
            entry.current = 0;
            entry.index = index;
        }

        let previous = self.window.weighted_previous(now_ms, entry.previous);
        if previous + entry.current >= limit {
            debug!(key = %key, "Throttle window exhausted");
            return ThrottleDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset,
            };
        }

        entry.current += 1;
        ThrottleDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(entry.current + previous),
            reset,
        }
    }
}

#[async_trait]
impl Throttle for MemoryThrottle {
    async fn check(&self, key: &str) -> Result<ThrottleDecision, ThrottleError> {
        let now = (self.clock)();
        Ok(self.check_at(key, now).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn throttle() -> MemoryThrottle {
        MemoryThrottle::new(5, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let throttle = throttle();

        for expected_remaining in (0..5).rev() {
            let decision = throttle.check_at("10.0.0.1", 1_000).await;
            assert!(decision.allowed);
            assert_eq!(decision.limit, 5);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset, 5_000);
        }

        let decision = throttle.check_at("10.0.0.1", 1_001).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let throttle = throttle();

        for _ in 0..5 {
            throttle.check_at("10.0.0.1", 0).await;
        }
        assert!(!throttle.check_at("10.0.0.1", 1).await.allowed);
        assert!(throttle.check_at("10.0.0.2", 1).await.allowed);
    }

    #[tokio::test]
    async fn test_previous_window_is_weighted() {
        let throttle = throttle();

        for _ in 0..4 {
            assert!(throttle.check_at("k", 4_000).await.allowed);
        }

        // 20% into the next window: floor(0.8 * 4) = 3 still count
        let decision = throttle.check_at("k", 6_000).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);

        let decision = throttle.check_at("k", 6_001).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);

        assert!(!throttle.check_at("k", 6_002).await.allowed);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let throttle = throttle();

        for _ in 0..5 {
            throttle.check_at("k", 0).await;
        }
        assert!(!throttle.check_at("k", 100).await.allowed);

        // Two windows later nothing from the burst remains
        let decision = throttle.check_at("k", 10_000).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_denied_requests_are_not_counted() {
        let throttle = throttle();

        for _ in 0..20 {
            throttle.check_at("k", 0).await;
        }

        // Only the 5 allowed requests carry into the next window
        // and half of them still weigh on it midway: 5 - (1 + 2)
        let decision = throttle.check_at("k", 7_500).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
    }

    #[tokio::test]
    async fn test_check_uses_clock() {
        let now = Arc::new(AtomicI64::new(0));
        let clock_now = now.clone();
        let throttle = MemoryThrottle::with_clock(
            1,
            Duration::from_secs(5),
            Arc::new(move || clock_now.load(Ordering::SeqCst)),
        );

        assert!(throttle.check("k").await.unwrap().allowed);
        assert!(!throttle.check("k").await.unwrap().allowed);

        now.store(10_000, Ordering::SeqCst);
        assert!(throttle.check("k").await.unwrap().allowed);
    }
}
