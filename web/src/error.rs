//! Error types for web handlers.
//!
//! This module defines the error type handlers return and the envelope it is
//! serialized into, bridging domain errors and HTTP responses via Axum's
//! `IntoResponse` trait.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Application error type for web handlers.
///
/// This type wraps domain errors and provides HTTP-friendly error responses.
/// It implements Axum's `IntoResponse` trait to automatically convert errors
/// into HTTP responses shaped as `{"error": {"code", "message", "trace_id"}}`.
/// No internal detail (stack traces, source error text) ever reaches the
/// client body - only `code` and `message` are serialized, and `source` is
/// logged server-side only.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Data>, AppError> {
///     let record = find_record(id).await
///         .map_err(|e| AppError::not_found("QueueRecord", id))?;
///     Ok(Json(record))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Correlation id surfaced to the client for support escalation.
    trace_id: Option<Uuid>,
    /// Internal error (for logging, not exposed to client)
    #[allow(dead_code)]
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            trace_id: None,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach the request's correlation id so the client can quote it back
    /// to support without us round-tripping through logs to find it.
    #[must_use]
    pub const fn with_trace_id(mut self, trace_id: Uuid) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error for a missing or invalid bearer token.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHENTICATED".to_string(),
        )
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            message.into(),
            "FORBIDDEN".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "CONFLICT".to_string(),
        )
    }

    /// Create a 409 Conflict error for an idempotency key replayed with a
    /// different request body than the one it was first used with.
    #[must_use]
    pub fn idempotency_conflict(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            message.into(),
            "IDEMPOTENCY_CONFLICT".to_string(),
        )
    }

    /// Create a 400 Bad Request error for a missing or malformed
    /// `Idempotency-Key` header.
    #[must_use]
    pub fn idempotency_required(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "IDEMPOTENCY_REQUIRED".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            message.into(),
            "TIMEOUT".to_string(),
        )
    }

    /// Create a 429 Too Many Requests error for the front-door rate limiter.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            message.into(),
            "RATE_LIMITED".to_string(),
        )
    }

    /// Create a 403 Forbidden error for an eligibility decision that denied
    /// entry (below the minimum wait floor, or position too far back).
    #[must_use]
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            reason.into(),
            "NOT_READY".to_string(),
        )
    }

    /// Create a 504 Gateway Timeout error for a downstream reservation or
    /// payment backend call that exceeded its deadline.
    #[must_use]
    pub fn upstream_timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            message.into(),
            "UPSTREAM_TIMEOUT".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error (store unreachable, or the
    /// circuit breaker protecting it is open).
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Inner error fields, nested under `"error"` in the response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
    /// Correlation id for support escalation.
    trace_id: Uuid,
}

/// Error response envelope (JSON): `{"error": {"code", "message", "trace_id"}}`.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace_id = self.trace_id.unwrap_or_else(Uuid::new_v4);

        // Log internal errors
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    trace_id = %trace_id,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    trace_id = %trace_id,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                trace_id,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err = AppError::not_found("QueueRecord", "123");
        assert_eq!(
            err.to_string(),
            "[NOT_FOUND] QueueRecord with id 123 not found"
        );
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation() {
        let err = AppError::validation("Email is required");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_timeout() {
        let err = AppError::timeout("Request timed out");
        assert_eq!(err.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.code, "TIMEOUT");
    }

    #[test]
    fn test_rate_limited() {
        let err = AppError::rate_limited("Too many requests");
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code, "RATE_LIMITED");
    }

    #[test]
    fn test_idempotency_conflict() {
        let err = AppError::idempotency_conflict("key reused with a different body");
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "IDEMPOTENCY_CONFLICT");
    }

    #[test]
    fn test_not_ready() {
        let err = AppError::not_ready("position 137 is above the minimum-wait floor");
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "NOT_READY");
    }

    #[test]
    fn test_upstream_timeout() {
        let err = AppError::upstream_timeout("reservation backend did not respond in time");
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code, "UPSTREAM_TIMEOUT");
    }

    #[test]
    fn test_trace_id_defaults_when_unset() {
        let err = AppError::internal("boom");
        assert!(err.trace_id.is_none());
    }

    #[test]
    fn test_trace_id_carried_when_set() {
        let id = Uuid::new_v4();
        let err = AppError::internal("boom").with_trace_id(id);
        assert_eq!(err.trace_id, Some(id));
    }
}
