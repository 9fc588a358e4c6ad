//! `POST /api/v1/queue/join`

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use waitline_engine::{JoinOutcome, JoinRequest as EngineJoinRequest};
use waitline_web::{AppError, CorrelationId};

use super::{map_engine_error, require_idempotency_key};
use crate::idempotency::{self, IdempotencyCheck};
use crate::state::GatewayState;

/// Request body for Join.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinRequestBody {
    /// Event to queue for.
    pub event_id: String,
    /// Caller-supplied user id; the engine substitutes an anonymous id if
    /// absent.
    pub user_id: Option<String>,
}

/// Response body for a successful (or degraded) Join.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JoinResponseBody {
    /// Opaque token identifying this queue position.
    pub waiting_token: String,
    /// Best-effort position estimate available at enqueue time.
    pub position_hint: u64,
    /// Always `"waiting"`.
    pub status: String,
}

/// Admits a new token into the waiting room.
///
/// # Errors
///
/// Returns `400 BAD_REQUEST` for a missing/malformed `Idempotency-Key`,
/// `409 IDEMPOTENCY_CONFLICT` if the key was reused with a different body,
/// or `503 SERVICE_UNAVAILABLE` if the store is unreachable.
pub async fn join(
    State(state): State<Arc<GatewayState>>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    Json(body): Json<JoinRequestBody>,
) -> Result<(StatusCode, Json<JoinResponseBody>), AppError> {
    let idempotency_key = require_idempotency_key(&headers).map_err(|err| err.with_trace_id(correlation_id.0))?;
    let scope = GatewayState::idempotency_scope(&body.event_id);
    let conn = state.store.conn();

    match idempotency::check::<_, JoinResponseBody>(&conn, &scope, &idempotency_key, &body).await {
        Ok(IdempotencyCheck::Replay(cached)) => return Ok((StatusCode::ACCEPTED, Json(cached))),
        Ok(IdempotencyCheck::Conflict) => {
            return Err(AppError::idempotency_conflict("idempotency key reused with a different request body")
                .with_trace_id(correlation_id.0))
        }
        Ok(IdempotencyCheck::Fresh) => {}
        Err(err) => return Err(AppError::unavailable(err.to_string()).with_trace_id(correlation_id.0)),
    }

    let engine_request = EngineJoinRequest { event_id: body.event_id.clone(), user_id: body.user_id.clone() };
    let outcome = state
        .engine
        .join(engine_request, &idempotency_key)
        .await
        .map_err(|err| map_engine_error(err, &body.event_id, correlation_id.0))?;

    let response = match outcome {
        JoinOutcome::Waiting { waiting_token, position_hint } => {
            JoinResponseBody { waiting_token, position_hint, status: "waiting".to_string() }
        }
        JoinOutcome::Degraded { waiting_token, position_hint } => {
            JoinResponseBody { waiting_token, position_hint, status: "waiting".to_string() }
        }
    };

    if let Err(err) = idempotency::store(&conn, &scope, &idempotency_key, &body, &response).await {
        tracing::warn!(error = %err, "failed to cache idempotent Join response");
    }

    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_response_body_roundtrips_through_json() {
        let body = JoinResponseBody { waiting_token: "tok".to_string(), position_hint: 5, status: "waiting".to_string() };
        let json = serde_json::to_string(&body).unwrap();
        let parsed: JoinResponseBody = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, body);
    }
}
