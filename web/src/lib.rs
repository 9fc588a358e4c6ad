//! Axum web framework glue for the admission gateway.
//!
//! This crate holds everything about the HTTP shell that doesn't care what
//! the gateway's handlers actually do: correlation IDs, client-IP and
//! user-agent extraction, the error envelope handlers convert into, and a
//! generic `AppState` applications narrow with their own fields.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract data** from the request (JSON body, headers, query params)
//! 3. Handler talks to the store/engine directly (no reducer indirection)
//! 4. **Map result** to an HTTP response, or to [`AppError`] on failure
//!
//! # Example
//!
//! ```ignore
//! use waitline_web::{AppState, AppError};
//! use axum::{Router, routing::post, Json};
//!
//! async fn handle_join(
//!     State(state): State<AppState>,
//!     Json(request): Json<JoinRequest>,
//! ) -> Result<Json<JoinResponse>, AppError> {
//!     let record = state.engine.join(request).await?;
//!     Ok(Json(JoinResponse::from(record)))
//! }
//!
//! let app = Router::new()
//!     .route("/api/v1/queue/join", post(handle_join))
//!     .with_state(app_state);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId, UserAgent};
pub use middleware::{correlation_id_layer, CorrelationIdExt, CORRELATION_ID_HEADER};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
