//! Store-layer error type.
//!
//! Every fallible store operation returns [`StoreError`]. Callers in
//! `waitline-engine` map these onto domain errors; callers in
//! `waitline-web` map domain errors onto the client-facing error envelope.
//! The store layer itself never decides HTTP semantics.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying Redis client/connection manager returned an error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A store call did not complete within its deadline.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// An atomic script (see [`crate::scripts`]) returned a known failure code.
    #[error("script returned failure code: {0}")]
    ScriptFailure(String),

    /// A key set was passed to a script whose members do not all share a
    /// shard hint. This is always a programming bug, never a runtime
    /// condition (see the design notes on cluster-safe scripting).
    #[error("keys do not share a shard hint: {0:?}")]
    CrossSlot(Vec<String>),

    /// The connection pool could not hand out a connection before its wait
    /// timeout elapsed.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// A stored value failed to deserialize as the expected type.
    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// `true` for failure classes that should count against the circuit
    /// breaker (transient, store-side failures), `false` for failures that
    /// are really caller bugs (e.g. [`StoreError::CrossSlot`]).
    #[must_use]
    pub const fn counts_as_breaker_failure(&self) -> bool {
        !matches!(self, Self::CrossSlot(_) | Self::Decode(_))
    }
}
