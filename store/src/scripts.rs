//! Scripted atomic operations (component B).
//!
//! Three server-side Lua scripts, each registered once (via
//! [`redis::Script`], which handles `EVALSHA`/`EVAL` fallback internally)
//! and invoked with an explicit key list. Every key passed to one script
//! must share a shard hint (see [`crate::keys`]) — that invariant is
//! asserted in the unit tests below rather than checked at runtime, since a
//! violation is a caller bug, not a recoverable condition.

use crate::client::StoreConn;
use crate::error::{Result, StoreError};
use redis::Script;
use std::sync::LazyLock;

/// `enqueue(dedupeKey, streamKey; token, eventId, userId, ttlSec)`.
///
/// Returns `{1, streamId}` on success, `{0, "DUPLICATE"}` if the idempotency
/// key has already been used.
static ENQUEUE_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local dedupe_key = KEYS[1]
        local stream_key = KEYS[2]
        local token = ARGV[1]
        local event_id = ARGV[2]
        local user_id = ARGV[3]
        local ttl_sec = tonumber(ARGV[4])
        local ts = ARGV[5]

        if redis.call('EXISTS', dedupe_key) == 1 then
            return {0, 'DUPLICATE'}
        end

        local stream_id = redis.call('XADD', stream_key, '*',
            'token', token, 'event_id', event_id, 'user_id', user_id, 'ts', ts)
        redis.call('SET', dedupe_key, '1', 'EX', ttl_sec)

        return {1, stream_id}
        ",
    )
});

/// `holdSeat(seatStatusKey, holdKey, inventoryKey; seatId, userId, ttlSec)`.
///
/// Returns `{1, remainingInventory}` on success, `{0, "SEAT_UNAVAILABLE"}` if
/// the seat is already held/sold, `{0, "SOLD_OUT"}` if inventory is
/// exhausted.
static HOLD_SEAT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local status_key = KEYS[1]
        local hold_key = KEYS[2]
        local inventory_key = KEYS[3]
        local user_id = ARGV[1]
        local ttl_sec = tonumber(ARGV[2])

        local status = redis.call('GET', status_key)
        if status and status ~= 'AVAILABLE' then
            return {0, 'SEAT_UNAVAILABLE'}
        end

        local remaining = redis.call('DECR', inventory_key)
        if remaining < 0 then
            redis.call('INCR', inventory_key)
            return {0, 'SOLD_OUT'}
        end

        redis.call('SET', status_key, 'HOLD', 'EX', ttl_sec)
        redis.call('SET', hold_key, user_id, 'EX', ttl_sec)

        return {1, remaining}
        ",
    )
});

/// `releaseSeat(seatStatusKey, holdKey, inventoryKey; seatId, userId)`.
///
/// Mirrors [`HOLD_SEAT_SCRIPT`]: restores inventory and clears the hold,
/// provided the hold is still owned by `userId`.
static RELEASE_SEAT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local status_key = KEYS[1]
        local hold_key = KEYS[2]
        local inventory_key = KEYS[3]
        local user_id = ARGV[1]

        local holder = redis.call('GET', hold_key)
        if holder ~= user_id then
            return {0, 'NOT_HOLDER'}
        end

        redis.call('DEL', hold_key)
        redis.call('SET', status_key, 'AVAILABLE')
        local remaining = redis.call('INCR', inventory_key)

        return {1, remaining}
        ",
    )
});

/// Outcome of [`enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The append succeeded; carries the store-assigned stream id.
    Appended {
        /// Monotonically increasing id within this user's stream.
        stream_id: String,
    },
    /// The idempotency key had already been used.
    Duplicate,
}

/// Appends to a user's stream log under an idempotency guard, in one
/// round-trip (component B, `enqueue`).
///
/// `dedupe_key` and `stream_key` must share a shard hint; see
/// [`crate::keys::assert_same_shard`].
///
/// # Errors
///
/// Returns [`StoreError::Redis`] on a connection failure, or
/// [`StoreError::ScriptFailure`] if the script returns an unrecognized code.
pub async fn enqueue(
    conn: &StoreConn,
    dedupe_key: &str,
    stream_key: &str,
    token: &str,
    event_id: &str,
    user_id: &str,
    ttl_sec: u64,
    now_ms: u64,
) -> Result<EnqueueOutcome> {
    let invocation = ENQUEUE_SCRIPT
        .key(dedupe_key)
        .key(stream_key)
        .arg(token)
        .arg(event_id)
        .arg(user_id)
        .arg(ttl_sec)
        .arg(now_ms);

    let (ok, payload): (i64, String) = invoke(conn, invocation).await?;
    if ok == 1 {
        Ok(EnqueueOutcome::Appended { stream_id: payload })
    } else if payload == "DUPLICATE" {
        Ok(EnqueueOutcome::Duplicate)
    } else {
        Err(StoreError::ScriptFailure(payload))
    }
}

/// Outcome of [`hold_seat`]/[`release_seat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatOutcome {
    /// The hold (or release) succeeded; carries remaining inventory.
    Ok {
        /// Inventory remaining after this operation.
        remaining: i64,
    },
    /// The seat was already held or sold.
    SeatUnavailable,
    /// Inventory was already at zero.
    SoldOut,
    /// A release was attempted by a user who does not hold the seat.
    NotHolder,
}

/// Places a hold on a seat, decrementing inventory atomically (component B,
/// `holdSeat`). Used by the reservation backend client, not by the
/// admission engine itself, but specified here since it shares the atomic
/// scripting discipline.
///
/// # Errors
///
/// Returns [`StoreError::Redis`] on a connection failure, or
/// [`StoreError::ScriptFailure`] if the script returns an unrecognized code.
pub async fn hold_seat(
    conn: &StoreConn,
    seat_status_key: &str,
    hold_key: &str,
    inventory_key: &str,
    user_id: &str,
    ttl_sec: u64,
) -> Result<SeatOutcome> {
    let invocation = HOLD_SEAT_SCRIPT
        .key(seat_status_key)
        .key(hold_key)
        .key(inventory_key)
        .arg(user_id)
        .arg(ttl_sec);

    decode_seat_outcome(invoke(conn, invocation).await?)
}

/// Releases a previously held seat (component B, `releaseSeat`).
///
/// # Errors
///
/// Returns [`StoreError::Redis`] on a connection failure, or
/// [`StoreError::ScriptFailure`] if the script returns an unrecognized code.
pub async fn release_seat(
    conn: &StoreConn,
    seat_status_key: &str,
    hold_key: &str,
    inventory_key: &str,
    user_id: &str,
) -> Result<SeatOutcome> {
    let invocation = RELEASE_SEAT_SCRIPT
        .key(seat_status_key)
        .key(hold_key)
        .key(inventory_key)
        .arg(user_id);

    decode_seat_outcome(invoke(conn, invocation).await?)
}

fn decode_seat_outcome((ok, payload): (i64, redis::Value)) -> Result<SeatOutcome> {
    use redis::FromRedisValue;
    if ok == 1 {
        let remaining = i64::from_redis_value(&payload)?;
        return Ok(SeatOutcome::Ok { remaining });
    }
    let code = String::from_redis_value(&payload)?;
    match code.as_str() {
        "SEAT_UNAVAILABLE" => Ok(SeatOutcome::SeatUnavailable),
        "SOLD_OUT" => Ok(SeatOutcome::SoldOut),
        "NOT_HOLDER" => Ok(SeatOutcome::NotHolder),
        other => Err(StoreError::ScriptFailure(other.to_string())),
    }
}

async fn invoke<T: redis::FromRedisValue>(
    conn: &StoreConn,
    invocation: redis::ScriptInvocation<'_>,
) -> Result<T> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(invocation.invoke_async(&mut c).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(invocation.invoke_async(&mut c).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    #[test]
    fn test_enqueue_script_keys_share_shard() {
        let dedupe = keys::dedupe_key("evt_1", "idem_1");
        let stream = keys::user_stream("evt_1", "u1");
        assert!(keys::assert_same_shard(&[&dedupe, &stream]).is_ok());
    }

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_enqueue_then_duplicate() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let dedupe = keys::dedupe_key(&event_id, "idem_1");
        let stream = keys::user_stream(&event_id, "u1");

        let first = enqueue(&conn, &dedupe, &stream, "tok_1", &event_id, "u1", 300, 1).await.unwrap();
        assert!(matches!(first, EnqueueOutcome::Appended { .. }));

        let second = enqueue(&conn, &dedupe, &stream, "tok_2", &event_id, "u1", 300, 2).await.unwrap();
        assert_eq!(second, EnqueueOutcome::Duplicate);
    }
}
