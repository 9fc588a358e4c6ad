//! `GET /api/v1/queue/status?token=...`

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use waitline_web::{AppError, CorrelationId};

use super::map_engine_error;
use crate::state::GatewayState;

/// Query parameters for Status.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    /// Waiting token returned by a prior Join.
    pub token: String,
}

/// Response body for Status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponseBody {
    /// Always `"waiting"` for a token Status can still resolve.
    pub status: &'static str,
    /// 1-based position in the queue.
    pub position: u64,
    /// Estimated seconds until admission.
    pub eta_sec: u64,
    /// Confidence of `eta_sec`, in `[0.2, 1.0]`.
    pub confidence: f64,
    /// Seconds elapsed since Join.
    pub waiting_time_sec: u64,
    /// Whether Enter would currently be expected to succeed.
    pub ready_for_entry: bool,
}

/// Reports position, ETA and readiness for a waiting token. Read-mostly:
/// the only mutation is a heartbeat refresh, performed by the engine as a
/// side effect of a client still being present to poll.
///
/// # Errors
///
/// Returns `404 NOT_FOUND` if the token is unknown (expired, entered, or
/// left), or `503 SERVICE_UNAVAILABLE` if the store is unreachable.
pub async fn status(
    State(state): State<Arc<GatewayState>>,
    correlation_id: CorrelationId,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponseBody>, AppError> {
    let outcome = state
        .engine
        .status(&query.token)
        .await
        .map_err(|err| map_engine_error(err, &query.token, correlation_id.0))?;

    Ok(Json(StatusResponseBody {
        status: "waiting",
        position: outcome.position,
        eta_sec: outcome.eta_secs,
        confidence: outcome.confidence,
        waiting_time_sec: outcome.waiting_time_secs,
        ready_for_entry: outcome.ready_for_entry,
    }))
}
