//! Thin Axum handlers translating HTTP requests into `waitline_engine::Engine` calls.

pub mod enter;
pub mod join;
pub mod leave;
pub mod status;

use uuid::Uuid;
use waitline_engine::EngineError;
use waitline_web::AppError;

/// Header carrying the caller-supplied idempotency key, required on every
/// write operation (Join, Enter, Leave).
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Extracts and validates the `Idempotency-Key` header: present, and a
/// well-formed UUID.
pub(crate) fn require_idempotency_key(headers: &axum::http::HeaderMap) -> Result<String, AppError> {
    let raw = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::idempotency_required("Idempotency-Key header is required"))?;

    Uuid::parse_str(raw)
        .map_err(|_| AppError::bad_request("Idempotency-Key must be a version-4 UUID"))?;

    Ok(raw.to_string())
}

/// Maps a domain error onto the client-facing envelope. `waiting_token` is
/// used as the id in a `NOT_FOUND` response; pass the best available
/// context when the error can't actually be `NotFound` (e.g. Join).
pub(crate) fn map_engine_error(err: EngineError, waiting_token: &str, trace_id: Uuid) -> AppError {
    let app_err = match err {
        EngineError::NotFound => AppError::not_found("waiting token", waiting_token),
        EngineError::IdempotencyConflict => {
            AppError::idempotency_conflict("idempotency key already used with a different request")
        }
        EngineError::IdempotencyReplay => {
            AppError::internal("idempotency replay should have been resolved by the gateway cache")
        }
        EngineError::NotReady(reason) => AppError::not_ready(reason.as_str()),
        EngineError::StoreUnavailable => AppError::unavailable("store circuit breaker is open"),
        EngineError::Store(store_err) => AppError::unavailable(store_err.to_string()),
    };
    app_err.with_trace_id(trace_id)
}
