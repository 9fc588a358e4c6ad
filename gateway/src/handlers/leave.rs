//! `DELETE /api/v1/queue/leave?token=...`

use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use waitline_web::{AppError, CorrelationId};

use super::map_engine_error;
use crate::state::GatewayState;

/// Query parameters for Leave.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveQuery {
    /// Waiting token to withdraw.
    pub token: String,
}

/// Withdraws a waiting token without admitting it. Idempotent: leaving an
/// already-gone token still returns `204`.
///
/// # Errors
///
/// Returns `503 SERVICE_UNAVAILABLE` if the store is unreachable; an
/// unknown token is not itself an error (see [`waitline_engine::Engine::leave`]).
pub async fn leave(
    State(state): State<Arc<GatewayState>>,
    correlation_id: CorrelationId,
    Query(query): Query<LeaveQuery>,
) -> Result<StatusCode, AppError> {
    state
        .engine
        .leave(&query.token)
        .await
        .map_err(|err| map_engine_error(err, &query.token, correlation_id.0))?;

    Ok(StatusCode::NO_CONTENT)
}
