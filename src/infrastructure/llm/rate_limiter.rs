//! Sliding-window request limiter placed in front of the model client

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

const MIN_WAIT: Duration = Duration::from_millis(1);

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Total limit for the window
    pub limit: u32,
    /// Time until the oldest request leaves the window
    pub reset_in: Duration,
}

/// Requests-per-window limiter shared by every model call of a process
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    records: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check the window and record the request when it is allowed
    pub async fn check_and_record(&self) -> RateLimitResult {
        let now = Instant::now();
        let mut records = self.records.lock().await;

        while let Some(oldest) = records.front() {
            if now.duration_since(*oldest) >= self.window {
                records.pop_front();
            } else {
                break;
            }
        }

        let in_window = records.len() as u32;
        if in_window >= self.limit {
            let reset_in = records
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);

            return RateLimitResult {
                allowed: false,
                remaining: 0,
                limit: self.limit,
                reset_in,
            };
        }

        records.push_back(now);

        RateLimitResult {
            allowed: true,
            remaining: self.limit - in_window - 1,
            limit: self.limit,
            reset_in: records
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window),
        }
    }

    /// Wait until the window has room, then record the request.
    ///
    /// Returns how long the caller was held back.
    pub async fn until_ready(&self) -> Duration {
        let started = Instant::now();

        loop {
            let check = self.check_and_record().await;
            if check.allowed {
                return started.elapsed();
            }

            debug!(
                limit = check.limit,
                wait_ms = check.reset_in.as_millis() as u64,
                "Request window full, waiting for a free slot"
            );
            tokio::time::sleep(check.reset_in.max(MIN_WAIT)).await;
        }
    }

    /// Forget all recorded requests
    pub async fn reset(&self) {
        self.records.lock().await.clear();
    }
}
