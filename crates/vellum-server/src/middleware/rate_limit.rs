//! In-process sliding-window rate limiting keyed by client IP.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use tracing::warn;
use vellum_core::error::VellumError;

use crate::error::ApiError;
use crate::middleware::auth::client_ip;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

/// Timestamps of recent requests per key; entries older than the
/// window are dropped on every check.
pub struct RateLimiter {
    requests: DashMap<String, Vec<u64>>,
    window_secs: u64,
    max_requests: u32,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            requests: DashMap::new(),
            window_secs: settings.window_secs,
            max_requests: settings.max_requests,
        }
    }

    /// Record a request for `key` unless its budget is spent.
    pub fn check_and_record(&self, key: &str) -> bool {
        self.check_and_record_at(key, now_secs())
    }

    fn check_and_record_at(&self, key: &str, now: u64) -> bool {
        let cutoff = now.saturating_sub(self.window_secs);
        let mut entry = self.requests.entry(key.to_string()).or_default();
        entry.retain(|&ts| ts > cutoff);

        if entry.len() >= self.max_requests as usize {
            return false;
        }
        entry.push(now);
        true
    }

    /// Forget keys with no request inside the window.
    pub fn cleanup(&self) {
        self.cleanup_at(now_secs());
    }

    fn cleanup_at(&self, now: u64) {
        let cutoff = now.saturating_sub(self.window_secs);
        self.requests.retain(|_, stamps| {
            stamps.retain(|&ts| ts > cutoff);
            !stamps.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

/// Middleware rejecting requests with 429 once the caller's IP has
/// used its budget for the current window.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(request.headers(), request.extensions());
    if !limiter.check_and_record(&ip) {
        warn!(client_ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        return Err(VellumError::RateLimited.into());
    }
    Ok(next.run(request).await)
}
