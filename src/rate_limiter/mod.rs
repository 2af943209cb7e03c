//! Fixed-window, per-client rate limiting for the public lookup endpoints.
//!
//! Counters live in process memory; each instance enforces its own limit.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::errors::ServiceError;

/// Numeric strings are always valid header values.
fn num_to_header_value<T: ToString>(n: T) -> http::HeaderValue {
    http::HeaderValue::from_str(&n.to_string())
        .unwrap_or_else(|_| http::HeaderValue::from_static("0"))
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn roll_window(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.count = 0;
            self.window_start = now;
        }
    }

    fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.duration_since(self.window_start))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 30,
            window_duration: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, RateLimitEntry>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Counts one request for `key` and reports whether it is within the limit.
    pub fn check(&self, key: &str) -> RateLimitResult {
        let now = Instant::now();
        let limit = self.config.requests_per_window;
        let window = self.config.window_duration;

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry::new(now));
        entry.roll_window(now, window);

        if entry.count >= limit {
            return RateLimitResult {
                allowed: false,
                limit,
                remaining: 0,
                reset_time: entry.time_until_reset(now, window),
            };
        }

        entry.count += 1;
        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_time: entry.time_until_reset(now, window),
        }
    }

    /// Drops counters whose window has passed.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        let window = self.config.window_duration;
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) < window);
    }
}

/// Client key: first `x-forwarded-for` hop, then `x-real-ip`, then the peer address.
pub fn extract_ip_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                return format!("ip:{}", ip.trim());
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return format!("ip:{}", ip_str.trim());
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }

    "ip:unknown".to_string()
}

fn apply_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", num_to_header_value(result.limit));
    headers.insert(
        "X-RateLimit-Remaining",
        num_to_header_value(result.remaining),
    );
    headers.insert(
        "X-RateLimit-Reset",
        num_to_header_value(result.reset_time.as_secs()),
    );
}

/// Middleware for `from_fn_with_state`
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = extract_ip_key(&request);
    let result = limiter.check(&key);

    if !result.allowed {
        warn!(key = %key, "Rate limit exceeded");
        counter!("airpark.rate_limit.rejected", 1);
        let mut response = ServiceError::RateLimitExceeded.into_response();
        apply_headers(&mut response, &result);
        response
            .headers_mut()
            .insert("Retry-After", num_to_header_value(result.reset_time.as_secs().max(1)));
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &result);
    response
}

/// Periodically frees counters of clients that went quiet.
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            limiter.cleanup_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn allows_exactly_the_limit() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 3,
            window_duration: Duration::from_secs(60),
        });

        let remaining: Vec<u32> = (0..3).map(|_| limiter.check("ip:1").remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);
        assert!(!limiter.check("ip:1").allowed);
        assert!(limiter.check("ip:2").allowed);
    }

    #[test]
    fn window_resets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_window: 1,
            window_duration: Duration::ZERO,
        });
        assert!(limiter.check("ip:1").allowed);
        assert!(limiter.check("ip:1").allowed);
    }

    #[test]
    fn ip_key_prefers_forwarded_for() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .header("x-real-ip", "10.0.0.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip_key(&request), "ip:10.0.0.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_ip_key(&bare), "ip:unknown");
    }
}
