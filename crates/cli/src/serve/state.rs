//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use actlog_query::{ActivationQueries, Identity};
use actlog_storage::MemoryStore;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

const WINDOW: Duration = Duration::from_secs(RATE_LIMIT_WINDOW_SECS);

/// Per-IP request windows: (request count, window start time).
struct IpTracker {
    windows: HashMap<IpAddr, (u64, Instant)>,
    last_sweep: Instant,
}

impl IpTracker {
    /// Forget IPs whose window has expired, at most once per window.
    fn sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < WINDOW {
            return;
        }
        self.windows
            .retain(|_, (_, start)| now.duration_since(*start) < WINDOW);
        self.last_sweep = now;
    }
}

/// In-memory per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    /// Maximum requests per window.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(IpTracker {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            max_requests,
        }
    }

    /// Check if a request from the given IP is allowed.
    /// Returns Ok(()) if allowed, Err(retry_after_secs) if rate limited.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        tracker.sweep(now);

        let entry = tracker.windows.entry(ip).or_insert((0, now));

        // Reset window if expired
        let elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            entry.0 = 0;
            entry.1 = now;
        }

        entry.0 += 1;
        if entry.0 > self.max_requests {
            Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked_ips(&self) -> usize {
        self.tracker.lock().await.windows.len()
    }
}

/// Application state shared across request handlers.
pub(crate) struct AppState {
    pub(crate) queries: ActivationQueries<MemoryStore>,
    pub(crate) rate_limiter: RateLimiter,
    /// API key to identity.
    pub(crate) credentials: HashMap<String, Identity>,
}
