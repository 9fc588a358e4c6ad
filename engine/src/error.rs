//! Domain-level errors for the admission engine.

use thiserror::Error;

/// The sub-reason attached to an eligibility denial (spec: Enter returns
/// `403 NOT_READY` with one of these).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityReason {
    /// Position is beyond the eligible window (> 100).
    Position,
    /// The wait-time floor for this position has not yet elapsed.
    Wait,
    /// The token-bucket governor denied this attempt.
    Rate,
}

impl EligibilityReason {
    /// Stable string used in API responses and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Wait => "wait",
            Self::Rate => "rate",
        }
    }
}

impl std::fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the admission engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The store call failed; `counts_as_breaker_failure` tells the caller
    /// whether to count this against the circuit breaker.
    #[error(transparent)]
    Store(#[from] waitline_store::StoreError),

    /// The requested waiting token does not exist (expired or never
    /// issued).
    #[error("waiting token not found")]
    NotFound,

    /// An idempotency key was reused with a different request body.
    #[error("idempotency key already used with a different request")]
    IdempotencyConflict,

    /// An idempotency key was reused with the same body; the cached
    /// response should be replayed unchanged.
    #[error("idempotency key replay")]
    IdempotencyReplay,

    /// Enter was attempted while the token is not yet eligible.
    #[error("token not yet eligible to enter: {0}")]
    NotReady(EligibilityReason),

    /// The circuit breaker is open; calls to the store are short-circuited.
    #[error("store circuit breaker is open")]
    StoreUnavailable,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, EngineError>;
