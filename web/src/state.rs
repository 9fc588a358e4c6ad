//! Application state for Axum handlers.
//!
//! This module provides a generic `AppState` that can be customized per application.
//! Domain-specific dependencies (store client, circuit breaker, config) should
//! be added by the application using this crate.

/// Application state shared across all HTTP handlers.
///
/// This is a placeholder type. Applications should define their own state struct
/// containing their domain-specific store clients and resilience primitives.
///
/// # Examples
///
/// ```ignore
/// use axum::{extract::State, Json};
/// use waitline_web::AppError;
/// use waitline_runtime::CircuitBreaker;
/// use std::sync::Arc;
///
/// // Define your app-specific state
/// struct MyAppState {
///     store: Arc<waitline_store::StoreClient>,
///     breaker: CircuitBreaker,
/// }
///
/// async fn handler(
///     State(state): State<Arc<MyAppState>>,
/// ) -> Result<Json<Response>, AppError> {
///     // Use your store client
///     state.breaker.call(|| state.store.ping()).await?;
///     Ok(Json(response))
/// }
/// ```
#[derive(Clone)]
pub struct AppState {
    // Placeholder - applications should define their own state
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Ensure AppState implements Clone (required for Axum)
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_state_default() {
        let _ = AppState::default();
    }
}
