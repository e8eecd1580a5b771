use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

use crate::config::RateLimit;
use crate::error::ApiError;
use crate::metrics::RATE_LIMITED;
use crate::state::AppState;

// Checks between sweeps of clients whose window has ended
const SWEEP_EVERY: usize = 1024;

// Rate limit entry - tracks requests per client address
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

/// Fixed-window limiter keyed by client address.
pub struct RateLimiter {
    limit: RateLimit,
    entries: DashMap<String, RateLimitEntry>,
    checks: AtomicUsize,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            entries: DashMap::new(),
            checks: AtomicUsize::new(0),
        }
    }

    /// Counts the request and says whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }
        let now = Instant::now();

        let mut entry = self
            .entries
            .entry(client.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // window expired, start a new one
        if entry.window_start.elapsed() >= self.limit.window {
            entry.count = 1;
            entry.window_start = now;
            return true;
        }

        if entry.count < self.limit.max_requests {
            entry.count += 1;
            return true;
        }

        false
    }

    /// Forgets clients whose window has ended, they start fresh anyway.
    pub fn sweep(&self) {
        let window = self.limit.window;
        self.entries
            .retain(|_, entry| entry.window_start.elapsed() < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }
}

// Client address from the connection; "unknown" when served without ConnectInfo
fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    if !state.rate_limiter.check(&client) {
        RATE_LIMITED.inc();
        tracing::warn!(client, path = %req.uri().path(), "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimit {
            max_requests,
            window: Duration::from_secs(60),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_after_limit_until_window_resets() {
        let limiter = limiter(2);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.check("10.0.0.1"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_clients_are_swept() {
        let limiter = limiter(5);
        for i in 0..10 {
            assert!(limiter.check(&format!("10.0.1.{i}")));
        }
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.tracked_clients(), 10);

        for _ in 10..SWEEP_EVERY {
            limiter.check("10.0.0.1");
        }
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = limiter(1);
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
        assert!(!limiter.check("10.0.0.1"));
    }
}
