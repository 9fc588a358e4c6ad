//! Operational endpoints: liveness and readiness.
//!
//! These endpoints are used by load balancers and orchestration systems to
//! verify service health. Liveness never touches the store; readiness does,
//! under a bounded timeout, so a slow store degrades readiness rather than
//! hanging the probe.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for the readiness store ping.
pub const READINESS_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Liveness check (for `/healthz`).
///
/// Returns 200 OK to indicate the process is running and able to serve
/// requests. This endpoint does NOT check the store or any downstream
/// dependency - a store outage must not take liveness down with it.
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Something the readiness probe can ping with a bounded deadline.
///
/// Applications implement this for whatever client wraps their store
/// connection (a Redis `ConnectionManager`, a cluster client, ...).
pub trait StorePing: Send + Sync {
    /// Attempt a cheap round-trip against the store (e.g. `PING`).
    /// Returns `true` if the store answered before the caller's deadline.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}

/// Readiness response body.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReadinessBody {
    /// `"ready"` or `"not_ready"`.
    pub status: &'static str,
}

/// Readiness check (for `/readyz`).
///
/// Pings the store with a deadline of [`READINESS_PING_TIMEOUT`]. If the
/// ping doesn't return in time, or returns `false`, readiness reports 503 so
/// the load balancer stops routing new traffic here while still letting
/// in-flight requests and liveness probes succeed.
pub async fn readiness_check<H>(State(health): State<Arc<H>>) -> (StatusCode, Json<ReadinessBody>)
where
    H: StorePing + 'static,
{
    let ready = tokio::time::timeout(READINESS_PING_TIMEOUT, health.ping())
        .await
        .unwrap_or(false);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadinessBody {
        status: if ready { "ready" } else { "not_ready" },
    };

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    struct AlwaysUp;

    impl StorePing for AlwaysUp {
        async fn ping(&self) -> bool {
            true
        }
    }

    struct AlwaysDown;

    impl StorePing for AlwaysDown {
        async fn ping(&self) -> bool {
            false
        }
    }

    struct NeverResponds;

    impl StorePing for NeverResponds {
        async fn ping(&self) -> bool {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_readiness_when_store_healthy() {
        let (status, Json(body)) = readiness_check(State(Arc::new(AlwaysUp))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ready");
    }

    #[tokio::test]
    async fn test_readiness_when_store_unhealthy() {
        let (status, Json(body)) = readiness_check(State(Arc::new(AlwaysDown))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "not_ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_times_out_instead_of_hanging() {
        let handle = tokio::spawn(readiness_check(State(Arc::new(NeverResponds))));
        tokio::time::advance(READINESS_PING_TIMEOUT + Duration::from_secs(1)).await;
        let (status, Json(body)) = handle.await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "not_ready");
    }
}
