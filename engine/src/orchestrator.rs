//! Join / Status / Enter / Leave orchestrator (component J).
//!
//! Each public method here composes components A-I for one request: it
//! never talks to Redis directly, only through `waitline_store`, and every
//! store call is routed through the caller-supplied [`CircuitBreaker`] so a
//! degraded store degrades the whole engine uniformly rather than one
//! handler at a time.

use crate::eligibility::{self, Eligibility};
use crate::error::{EngineError, Result};
use crate::eta::{self, WindowCounts};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use waitline_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use waitline_runtime::metrics::{AdmissionMetrics, GovernorMetrics};
use waitline_store::{
    admission_counter, bucket, client::StoreConn, heartbeat, join_batch, keys, position_index,
    queue_record, scripts, stream_log, QueueRecord,
};

/// How long an idempotency dedupe guard lives at the store layer (component B).
pub const DEDUPE_TTL_SECS: u64 = 5 * 60;
/// User id recorded when a Join request does not supply one.
pub const ANONYMOUS_USER: &str = "anonymous";
/// Lifetime of the opaque reservation token minted on a successful Enter.
pub const RESERVATION_TOKEN_TTL_SECS: u64 = 30;
/// Position hint returned by a degraded Join (breaker open): deliberately
/// large so a client does not mistake it for a real, near-front position.
pub const DEGRADED_POSITION_HINT: u64 = 10_000;

/// A request to join an event's waiting room.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    /// Event to queue for.
    pub event_id: String,
    /// Caller-supplied user id; defaults to [`ANONYMOUS_USER`].
    pub user_id: Option<String>,
}

/// Outcome of [`Engine::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Enqueued normally; `position_hint` is a cheap estimate, refined
    /// asynchronously into the queue record's `last_known_position`.
    Waiting {
        /// Opaque token identifying this queue position.
        waiting_token: String,
        /// Best-effort position estimate available at enqueue time.
        position_hint: u64,
    },
    /// The store's circuit breaker was open; the token was minted and
    /// handed back, but nothing was persisted. The client should retry
    /// Status until the queue record exists.
    Degraded {
        /// Opaque token identifying this queue position.
        waiting_token: String,
        /// Always [`DEGRADED_POSITION_HINT`].
        position_hint: u64,
    },
}

/// Outcome of [`Engine::status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusOutcome {
    /// 1-based position in the queue.
    pub position: u64,
    /// Estimated seconds until admission.
    pub eta_secs: u64,
    /// Confidence of `eta_secs`, in `[0.2, 1.0]`.
    pub confidence: f64,
    /// Seconds elapsed since Join.
    pub waiting_time_secs: u64,
    /// Whether Enter would currently be expected to succeed. Advisory only:
    /// see [`eligibility::preview`].
    pub ready_for_entry: bool,
}

/// Outcome of a successful [`Engine::enter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterOutcome {
    /// Opaque reservation token, valid for [`RESERVATION_TOKEN_TTL_SECS`].
    pub reservation_token: String,
    /// Lifetime of `reservation_token`, in seconds.
    pub ttl_secs: u64,
}

/// Composes components A-L into the four request orchestrations the
/// gateway dispatches to.
pub struct Engine {
    store: StoreConn,
    breaker: CircuitBreaker,
}

impl Engine {
    /// Builds an engine over an already-connected store handle and a
    /// circuit breaker configured by the caller (spec: 5 failures, 10s
    /// open timeout, 3 consecutive successes to close).
    #[must_use]
    pub const fn new(store: StoreConn, breaker: CircuitBreaker) -> Self {
        Self { store, breaker }
    }

    /// Admits a new token into the waiting room (component J, Join).
    ///
    /// Returns [`JoinOutcome::Degraded`] instead of an error when the store
    /// circuit breaker is open, per the design notes' degraded-mode
    /// carve-out; every other store failure propagates normally.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IdempotencyConflict`] if `idempotency_key` was
    /// already used for this event with a different request, or a store
    /// error for anything else.
    pub async fn join(&self, request: JoinRequest, idempotency_key: &str) -> Result<JoinOutcome> {
        let user_id = request.user_id.unwrap_or_else(|| ANONYMOUS_USER.to_string());
        let event_id = request.event_id;
        let waiting_token = generate_token();
        let now = now_ms();

        let dedupe_key = keys::dedupe_key(&event_id, idempotency_key);
        let stream_key = keys::user_stream(&event_id, &user_id);
        keys::assert_same_shard(&[&dedupe_key, &stream_key])?;

        let enqueued = self
            .breaker
            .call(|| {
                scripts::enqueue(
                    &self.store,
                    &dedupe_key,
                    &stream_key,
                    &waiting_token,
                    &event_id,
                    &user_id,
                    DEDUPE_TTL_SECS,
                    now,
                )
            })
            .await;

        let stream_id = match enqueued {
            Ok(scripts::EnqueueOutcome::Appended { stream_id }) => stream_id,
            Ok(scripts::EnqueueOutcome::Duplicate) => {
                AdmissionMetrics::record_join("duplicate");
                return Err(EngineError::IdempotencyConflict);
            }
            Err(CircuitBreakerError::Open) => {
                tracing::warn!(event_id, "join degraded: store circuit breaker open");
                AdmissionMetrics::record_join("degraded");
                return Ok(JoinOutcome::Degraded {
                    waiting_token,
                    position_hint: DEGRADED_POSITION_HINT,
                });
            }
            Err(CircuitBreakerError::Inner(error)) => return Err(error.into()),
        };

        let record = QueueRecord {
            waiting_token: waiting_token.clone(),
            event_id: event_id.clone(),
            user_id,
            joined_at_ms: now,
            stream_id,
            last_known_position: None,
        };

        self.guarded(|| join_batch::apply(&self.store, &record)).await?;

        self.spawn_position_backfill(event_id, waiting_token.clone());
        AdmissionMetrics::record_join("admitted");

        Ok(JoinOutcome::Waiting { waiting_token, position_hint: 0 })
    }

    /// Reports position, ETA and readiness for a waiting token (component J,
    /// Status). Refreshes the heartbeat as a side effect, since a client
    /// polling Status is definitionally still present.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the token is unknown (expired,
    /// entered, or left), or a store error.
    pub async fn status(&self, waiting_token: &str) -> Result<StatusOutcome> {
        let record = self.load_record(waiting_token).await?;
        let position = self.resolve_position(&record).await?;

        let now = now_ms();
        let waiting_time_secs = now.saturating_sub(record.joined_at_ms) / 1000;

        let counter_key = keys::admission_counter(&record.event_id);
        let now_secs = i64::try_from(now / 1000).unwrap_or(i64::MAX);
        let counts = WindowCounts {
            last_1min: self.guarded(|| admission_counter::count_in_window(&self.store, &counter_key, now_secs, 60)).await?,
            last_5min: self.guarded(|| admission_counter::count_in_window(&self.store, &counter_key, now_secs, 300)).await?,
            last_15min: self.guarded(|| admission_counter::count_in_window(&self.store, &counter_key, now_secs, 900)).await?,
        };
        let estimate = eta::estimate(position, counts, hour_of_day(now));

        let wait = Duration::from_secs(waiting_time_secs);
        let ready_for_entry = eligibility::preview(position, wait);

        self.guarded(|| heartbeat::refresh(&self.store, waiting_token)).await?;
        AdmissionMetrics::record_estimate(position, estimate.eta_secs);

        Ok(StatusOutcome {
            position,
            eta_secs: estimate.eta_secs,
            confidence: estimate.confidence,
            waiting_time_secs,
            ready_for_entry,
        })
    }

    /// Attempts to admit a waiting token (component J, Enter). Consults the
    /// eligibility decider, which in turn consults the governor for
    /// non-VIP positions; on success, removes the token from C/D/E/F and
    /// mints a short-lived reservation token for the out-of-scope
    /// reservation backend to redeem.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the token is unknown,
    /// [`EngineError::NotReady`] if not yet eligible, or a store error.
    pub async fn enter(&self, waiting_token: &str) -> Result<EnterOutcome> {
        let record = self.load_record(waiting_token).await?;
        let position = self.resolve_position(&record).await?;
        let wait = Duration::from_secs(now_ms().saturating_sub(record.joined_at_ms) / 1000);

        let bucket_key = keys::bucket_state(&record.event_id);
        let decision = eligibility::decide(position, wait, || async {
            let now_secs = now_ms_f64();
            let result = self.guarded(|| bucket::try_consume(&self.store, &bucket_key, now_secs)).await?;
            if result.admitted {
                GovernorMetrics::record_consumed(1);
            } else {
                GovernorMetrics::record_exhausted();
            }
            Ok::<bool, EngineError>(result.admitted)
        })
        .await?;

        match decision {
            Eligibility::Ineligible(reason) => {
                AdmissionMetrics::record_enter("not_eligible");
                Err(EngineError::NotReady(reason))
            }
            Eligibility::Eligible { .. } => {
                self.retire_record(&record).await?;

                let reservation_token = generate_token();
                let now_secs = i64::try_from(now_ms() / 1000).unwrap_or(i64::MAX);
                let counter_key = keys::admission_counter(&record.event_id);
                self.guarded(|| {
                    admission_counter::record(&self.store, &counter_key, &record.user_id, &reservation_token, now_secs)
                })
                .await?;
                AdmissionMetrics::record_enter("admitted");

                Ok(EnterOutcome { reservation_token, ttl_secs: RESERVATION_TOKEN_TTL_SECS })
            }
        }
    }

    /// Withdraws a waiting token without admitting it (component J, Leave).
    /// Idempotent: leaving an already-gone token is not an error.
    ///
    /// # Errors
    ///
    /// Returns a store error if the removal itself fails.
    pub async fn leave(&self, waiting_token: &str) -> Result<()> {
        let Some(record) = self.guarded(|| queue_record::get(&self.store, waiting_token)).await? else {
            return Ok(());
        };
        self.retire_record(&record).await
    }

    /// Removes a token's state from D, the legacy compat set, E and F, and
    /// deletes its stream entry. Shared by Enter (on admission) and Leave.
    async fn retire_record(&self, record: &QueueRecord) -> Result<()> {
        let index_key = keys::position_index(&record.event_id);
        let compat_key = keys::event_queue_set(&record.event_id);
        let stream_key = keys::user_stream(&record.event_id, &record.user_id);

        self.guarded(|| position_index::remove(&self.store, &index_key, &record.waiting_token)).await?;
        self.guarded(|| position_index::remove(&self.store, &compat_key, &record.waiting_token)).await?;
        self.guarded(|| stream_log::delete_entry(&self.store, &stream_key, &record.stream_id)).await?;
        self.guarded(|| queue_record::delete(&self.store, &record.waiting_token)).await?;
        self.guarded(|| heartbeat::delete(&self.store, &record.waiting_token)).await?;
        Ok(())
    }

    async fn load_record(&self, waiting_token: &str) -> Result<QueueRecord> {
        self.guarded(|| queue_record::get(&self.store, waiting_token))
            .await?
            .ok_or(EngineError::NotFound)
    }

    /// Resolves the authoritative position for a record: D's rank, falling
    /// back to the legacy compat ordered set, then to the record's advisory
    /// `last_known_position`, then to an approximate half-queue-size
    /// constant (spec 4.D/4.F's documented degradation order).
    async fn resolve_position(&self, record: &QueueRecord) -> Result<u64> {
        let index_key = keys::position_index(&record.event_id);
        if let Some(rank) = self.guarded(|| position_index::rank(&self.store, &index_key, &record.waiting_token)).await? {
            return Ok(rank + 1);
        }

        let compat_key = keys::event_queue_set(&record.event_id);
        if let Some(rank) = self.guarded(|| position_index::rank(&self.store, &compat_key, &record.waiting_token)).await? {
            return Ok(rank + 1);
        }

        if let Some(position) = record.last_known_position {
            if position > 0 {
                return Ok(position);
            }
        }

        let size = self.guarded(|| position_index::size(&self.store, &index_key)).await?;
        Ok((size / 2).max(1))
    }

    /// Spawns the async position backfill that Join leaves behind: Join
    /// itself never blocks on a D rank lookup, so a client's first Status
    /// poll may still see `last_known_position: None` briefly.
    fn spawn_position_backfill(&self, event_id: String, waiting_token: String) {
        let store = self.store.clone();
        tokio::spawn(async move {
            let index_key = keys::position_index(&event_id);
            match position_index::rank(&store, &index_key, &waiting_token).await {
                Ok(Some(rank)) => {
                    if let Err(error) = queue_record::set_last_known_position(&store, &waiting_token, rank + 1).await {
                        tracing::warn!(%error, waiting_token, "failed to persist position backfill");
                    }
                }
                Ok(None) => {
                    tracing::debug!(waiting_token, "position backfill found no index entry, token already retired");
                }
                Err(error) => {
                    tracing::warn!(%error, waiting_token, "position backfill lookup failed");
                }
            }
        });
    }

    /// Routes a store call through the circuit breaker, mapping an open
    /// breaker to [`EngineError::StoreUnavailable`] rather than the
    /// underlying (absent) store error.
    async fn guarded<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = waitline_store::Result<T>>,
    {
        self.breaker.call(operation).await.map_err(|error| match error {
            CircuitBreakerError::Open => EngineError::StoreUnavailable,
            CircuitBreakerError::Inner(inner) => inner.into(),
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

fn now_ms_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs_f64()
}

/// Hour of day, 0..23 UTC, derived from epoch milliseconds without pulling
/// in a timezone-aware dependency this crate otherwise has no use for.
#[allow(clippy::cast_possible_truncation)]
const fn hour_of_day(now_ms: u64) -> usize {
    ((now_ms / 1000 / 3600) % 24) as usize
}

/// Generates an opaque 128-bit token, hex-encoded. Used for both waiting
/// tokens and reservation tokens; callers distinguish the two by context,
/// not by format.
fn generate_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_32_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_token_is_not_constant() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_hour_of_day_wraps() {
        assert_eq!(hour_of_day(0), 0);
        assert_eq!(hour_of_day(3_600_000), 1);
        assert_eq!(hour_of_day(24 * 3_600_000), 0);
    }
}
