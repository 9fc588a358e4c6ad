//! Front-door rate limiter.
//!
//! Distinct from the admission engine's token-bucket governor (component
//! H): that one paces *admissions* per event; this one paces *requests*
//! per client IP, in-process, to protect the gateway itself from a
//! thundering herd before a request ever reaches the engine. Same
//! lazy-refill algorithm as `waitline_store::bucket`, just kept in memory
//! instead of Redis since it needs no cross-instance consistency.

use crate::config::RateLimitConfig;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared, in-process rate limiter state.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

/// Outcome of a rate-limit check, used to build response headers
/// regardless of whether the request is admitted.
struct Decision {
    admitted: bool,
    limit: u32,
    remaining: u32,
    reset_secs: u64,
}

impl RateLimiter {
    /// Builds a limiter from the front-door rate-limit configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: Mutex::new(HashMap::new()) }
    }

    /// Whether `path` is exempt from rate limiting (health/readiness
    /// probes, metrics scraping).
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        self.config.exempt_paths.iter().any(|exempt| exempt == path)
    }

    fn check(&self, client: IpAddr) -> Decision {
        let capacity = f64::from(self.config.burst);
        let now = Instant::now();

        let mut buckets = self.buckets.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let bucket = buckets.entry(client).or_insert(Bucket { tokens: capacity, last_refill: now });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.rps).min(capacity);
        bucket.last_refill = now;

        let admitted = bucket.tokens >= 1.0;
        if admitted {
            bucket.tokens -= 1.0;
        }

        Decision {
            admitted,
            limit: self.config.burst,
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            remaining: bucket.tokens.max(0.0) as u32,
            reset_secs: now_secs() + 1,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs()
}

/// Axum middleware entry point: admits or rejects a request, and stamps
/// `X-RateLimit-*` headers (plus `Retry-After` on denial) on every
/// response.
///
/// # Errors
///
/// This middleware itself is infallible; a denied request becomes a `429`
/// response rather than propagating an error up the stack.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if limiter.is_exempt(&path) {
        return next.run(request).await;
    }

    let decision = limiter.check(addr.ip());
    let headers = [
        ("X-RateLimit-Limit", decision.limit.to_string()),
        ("X-RateLimit-Remaining", decision.remaining.to_string()),
        ("X-RateLimit-Reset", decision.reset_secs.to_string()),
    ];

    if !decision.admitted {
        let mut response = (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
        for (name, value) in headers {
            if let Ok(value) = value.parse() {
                response.headers_mut().insert(name, value);
            }
        }
        response.headers_mut().insert("Retry-After", HeaderValue::from_static("1"));
        return response;
    }

    let mut response = next.run(request).await;
    for (name, value) in headers {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RateLimitConfig {
        RateLimitConfig { rps: 10.0, burst: 5, exempt_paths: vec!["/healthz".to_string()] }
    }

    #[test]
    fn test_admits_within_burst() {
        let limiter = RateLimiter::new(config());
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..5 {
            assert!(limiter.check(ip).admitted);
        }
        assert!(!limiter.check(ip).admitted);
    }

    #[test]
    fn test_exempt_path_bypasses_limiter() {
        let limiter = RateLimiter::new(config());
        assert!(limiter.is_exempt("/healthz"));
        assert!(!limiter.is_exempt("/api/v1/queue/join"));
    }

    #[test]
    fn test_distinct_clients_have_independent_buckets() {
        let limiter = RateLimiter::new(config());
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        for _ in 0..5 {
            assert!(limiter.check(a).admitted);
        }
        assert!(limiter.check(b).admitted);
    }
}
