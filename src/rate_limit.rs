//! Rate limiting for the login callback and token refresh endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down code and
//! refresh-token guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

use crate::auth::client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Bucket shared by requests whose client IP cannot be determined.
const UNKNOWN_CLIENT: &str = "unknown";

/// Interval between sweeps of idle per-IP buckets.
pub const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

const CALLBACK_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const CALLBACK_BURST: NonZeroU32 = NonZeroU32::new(10).unwrap();
const REFRESH_PER_SEC: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REFRESH_BURST: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// Rate limiting configuration for authentication endpoints.
pub struct RateLimitConfig {
    /// OAuth callback: 10 burst, then 1 per second per IP
    pub callback: IpLimiter,
    /// Session refresh: 20 burst, then 5 per second per IP
    pub refresh: IpLimiter,
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self {
            callback: RateLimiter::keyed(
                Quota::per_second(CALLBACK_PER_SEC).allow_burst(CALLBACK_BURST),
            ),
            refresh: RateLimiter::keyed(
                Quota::per_second(REFRESH_PER_SEC).allow_burst(REFRESH_BURST),
            ),
        }
    }
}

impl RateLimitConfig {
    /// Forget clients whose buckets have refilled completely.
    pub fn prune(&self) {
        for limiter in [&self.callback, &self.refresh] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of clients currently tracked across both limiters.
    pub fn tracked_clients(&self) -> usize {
        self.callback.len() + self.refresh.len()
    }
}

/// Spawn a background task that prunes the limiters periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_limiter_cleanup(
    config: Arc<RateLimitConfig>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            config.prune();
            tracing::debug!(tracked = config.tracked_clients(), "Pruned rate limiters");
        }
    })
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check(limiter: &IpLimiter, request: &Request) -> bool {
    let ip = client_ip(request).unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    limiter.check_key(&ip).is_ok()
}

/// Middleware for rate limiting the OAuth callback.
pub async fn rate_limit_callback(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if check(&config.callback, &request) {
        next.run(request).await
    } else {
        tracing::warn!("Login callback rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts. Please wait before trying again.",
        )
            .into_response()
    }
}

/// Middleware for rate limiting session refresh.
pub async fn rate_limit_refresh(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    if check(&config.refresh, &request) {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_callback_burst_then_limited() {
        let config = RateLimitConfig::new();
        let request = request_from("198.51.100.1");

        for _ in 0..CALLBACK_BURST.get() {
            assert!(check(&config.callback, &request));
        }
        assert!(!check(&config.callback, &request));

        // Other clients keep their own bucket
        assert!(check(&config.callback, &request_from("198.51.100.2")));
    }

    #[test]
    fn test_prune_forgets_refilled_buckets() {
        let config = RateLimitConfig::new();
        for i in 0..500 {
            assert!(check(&config.refresh, &request_from(&format!("10.0.{}.{}", i / 256, i % 256))));
        }
        assert_eq!(config.tracked_clients(), 500);

        // One token at 5/s is back after 200 ms.
        std::thread::sleep(Duration::from_millis(400));
        config.prune();
        assert_eq!(config.tracked_clients(), 0);
    }

    #[test]
    fn test_prune_keeps_limited_clients() {
        let config = RateLimitConfig::new();
        let request = request_from("198.51.100.7");
        while check(&config.callback, &request) {}

        config.prune();
        assert_eq!(config.callback.len(), 1);
        assert!(!check(&config.callback, &request));
    }
}
