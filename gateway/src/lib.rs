//! The admission gateway's HTTP surface: router assembly, CORS, and the
//! layered middleware stack. `main` (in `src/bin/server.rs`) owns process
//! startup (config, store connection, graceful shutdown); this crate owns
//! what the router looks like once those pieces exist.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod handlers;
pub mod idempotency;
pub mod jwt;
pub mod rate_limit;
pub mod secrets;
pub mod state;

use axum::http::{HeaderName, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use state::GatewayState;

/// Header Axum's `request-id` layer stamps on every request/response, used
/// purely for load-balancer correlation; handlers use
/// [`waitline_web::CorrelationId`] (`X-Correlation-ID`) for everything
/// user-facing.
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Builds the full Axum router: the four admission endpoints, the
/// operational endpoints, and the middleware stack (CORS, compression,
/// tracing, request id, the front-door rate limiter).
///
/// `/metrics` is intentionally not mounted here: this workspace exposes
/// Prometheus text exposition on its own listener
/// (`waitline_runtime::metrics::MetricsServer`, bound to
/// `ServerConfig::metrics_address`) so a slow scrape can never compete with
/// admission traffic for the same listener's accept queue.
#[must_use]
pub fn router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static("idempotency-key"),
            HeaderName::from_static("x-correlation-id"),
        ]);

    let queue_routes = Router::new()
        .route("/api/v1/queue/join", post(handlers::join::join))
        .route("/api/v1/queue/status", get(handlers::status::status))
        .route("/api/v1/queue/enter", post(handlers::enter::enter))
        .route("/api/v1/queue/leave", delete(handlers::leave::leave))
        .with_state(state.clone())
        .route_layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit::rate_limit_middleware,
        ));

    let operational_routes = Router::new()
        .route("/healthz", get(waitline_web::handlers::health_check))
        .route("/readyz", get(waitline_web::handlers::readiness_check::<GatewayState>))
        .route("/version", get(waitline_web::handlers::version))
        .with_state(state);

    Router::new()
        .merge(queue_routes)
        .merge(operational_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(waitline_web::correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(30)))
}
