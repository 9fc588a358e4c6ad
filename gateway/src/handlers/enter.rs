//! `POST /api/v1/queue/enter`

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use waitline_web::{AppError, CorrelationId};

use super::{map_engine_error, require_idempotency_key};
use crate::state::GatewayState;

/// Request body for Enter.
#[derive(Debug, Clone, Deserialize)]
pub struct EnterRequestBody {
    /// Waiting token returned by a prior Join.
    pub waiting_token: String,
}

/// Response body for a successful Enter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnterResponseBody {
    /// Always `"granted"`.
    pub admission: &'static str,
    /// Opaque reservation token for the reservation backend to redeem.
    pub reservation_token: String,
    /// Lifetime of `reservation_token`, in seconds.
    pub ttl_sec: u64,
}

/// Attempts to admit a waiting token.
///
/// # Errors
///
/// Returns `400 BAD_REQUEST`/`IDEMPOTENCY_REQUIRED` for a missing or
/// malformed `Idempotency-Key`, `404 NOT_FOUND` if the token is unknown,
/// `403 NOT_READY` with a sub-reason if not yet eligible, or
/// `503 SERVICE_UNAVAILABLE` if the store is unreachable.
pub async fn enter(
    State(state): State<Arc<GatewayState>>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    Json(body): Json<EnterRequestBody>,
) -> Result<(StatusCode, Json<EnterResponseBody>), AppError> {
    require_idempotency_key(&headers).map_err(|err| err.with_trace_id(correlation_id.0))?;

    let outcome = state
        .engine
        .enter(&body.waiting_token)
        .await
        .map_err(|err| map_engine_error(err, &body.waiting_token, correlation_id.0))?;

    Ok((
        StatusCode::OK,
        Json(EnterResponseBody {
            admission: "granted",
            reservation_token: outcome.reservation_token,
            ttl_sec: outcome.ttl_secs,
        }),
    ))
}
