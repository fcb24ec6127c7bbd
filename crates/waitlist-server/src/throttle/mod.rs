//! Per-client request throttling.
//!
//! The endpoint only consumes the allow/deny decision and its advisory
//! metadata. Counting lives in the backend: Redis (through Upstash) in
//! production, a process-local map for development and tests.

mod memory;
mod upstash;

pub use memory::{Clock, MemoryThrottle};
pub use upstash::{UpstashThrottle, DEFAULT_PREFIX};

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a throttle check for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleDecision {
    /// Whether the request fits in the current window
    pub allowed: bool,
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the window after this one
    pub remaining: u32,
    /// Unix timestamp (milliseconds) at which the current window ends
    pub reset: i64,
}

impl ThrottleDecision {
    /// Decision used when the backend did not answer in time.
    pub fn timed_out() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset: 0,
        }
    }
}

/// Throttle backend errors.
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstash error: {0}")]
    Upstash(String),

    #[error("Unexpected throttle response: {0}")]
    InvalidResponse(String),
}

/// Sliding-window throttle keyed by client address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Throttle: Send + Sync {
    /// Count one request against `key` and report whether it is allowed.
    async fn check(&self, key: &str) -> Result<ThrottleDecision, ThrottleError>;
}

/// Window arithmetic shared by the throttle backends.
///
/// Time is split into fixed windows; the count of the previous window is
/// weighted by how much of it still overlaps the sliding window ending now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    pub limit: u32,
    pub window_ms: i64,
}

impl SlidingWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window_ms: (window.as_millis() as i64).max(1),
        }
    }

    /// Index of the fixed window containing `now_ms`.
    pub fn window_index(&self, now_ms: i64) -> i64 {
        now_ms.div_euclid(self.window_ms)
    }

    /// End of the fixed window containing `now_ms`.
    pub fn reset_at(&self, now_ms: i64) -> i64 {
        (self.window_index(now_ms) + 1) * self.window_ms
    }

    /// Previous-window count scaled by the unelapsed part of the current window.
    pub fn weighted_previous(&self, now_ms: i64, previous: u32) -> u32 {
        let elapsed = now_ms.rem_euclid(self.window_ms) as f64 / self.window_ms as f64;
        ((1.0 - elapsed) * previous as f64).floor() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_index_and_reset() {
        let window = SlidingWindow::new(5, Duration::from_secs(5));

        assert_eq!(window.window_ms, 5000);
        assert_eq!(window.window_index(0), 0);
        assert_eq!(window.window_index(4999), 0);
        assert_eq!(window.window_index(5000), 1);
        assert_eq!(window.reset_at(1234), 5000);
        assert_eq!(window.reset_at(5000), 10_000);
    }

    #[test]
    fn test_weighted_previous() {
        let window = SlidingWindow::new(5, Duration::from_secs(5));

        // Start of a window: the whole previous window still counts
        assert_eq!(window.weighted_previous(10_000, 4), 4);
        // Halfway through: half of it counts
        assert_eq!(window.weighted_previous(12_500, 4), 2);
        // Nearly over: rounds down to nothing
        assert_eq!(window.weighted_previous(14_999, 4), 0);
    }

    #[test]
    fn test_timed_out_decision_allows() {
        let decision = ThrottleDecision::timed_out();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
