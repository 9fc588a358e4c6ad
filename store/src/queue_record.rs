//! Queue record storage (component E).
//!
//! Per-token metadata: event, user, join time, stream id, and an advisory
//! `last_known_position`. Serialized as JSON and stored with a 30-minute
//! TTL under `queue:waiting:<token>` (no shard hint: touched in isolation).

use crate::client::StoreConn;
use crate::error::Result;
use crate::keys;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL for a queue record (30 minutes).
pub const QUEUE_RECORD_TTL: Duration = Duration::from_secs(30 * 60);

/// Per-token queue metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueRecord {
    /// Opaque 128-bit waiting token, hex-encoded.
    pub waiting_token: String,
    /// Event this token is queued for.
    pub event_id: String,
    /// User this token belongs to (`"anonymous"` if none was supplied).
    pub user_id: String,
    /// Join time, milliseconds since the Unix epoch.
    pub joined_at_ms: u64,
    /// Stream id assigned by [`crate::scripts::enqueue`].
    pub stream_id: String,
    /// Advisory position computed asynchronously after Join; Status
    /// recomputes this from the position index and does not trust a stale
    /// value.
    pub last_known_position: Option<u64>,
}

/// Stores a new queue record with [`QUEUE_RECORD_TTL`].
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn put(conn: &StoreConn, record: &QueueRecord) -> Result<()> {
    let key = keys::queue_record(&record.waiting_token);
    let payload = serde_json::to_vec(record)?;
    #[allow(clippy::cast_possible_truncation)]
    let ttl = QUEUE_RECORD_TTL.as_secs();
    set_ex(conn, &key, &payload, ttl).await
}

/// Loads a queue record by token. Returns `None` if the token is missing or
/// expired (spec: Status maps this to `{status:"not_found"}`).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure, or
/// [`crate::StoreError::Decode`] if a stored value fails to deserialize.
pub async fn get(conn: &StoreConn, waiting_token: &str) -> Result<Option<QueueRecord>> {
    let key = keys::queue_record(waiting_token);
    let raw: Option<Vec<u8>> = get_raw(conn, &key).await?;
    match raw {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Persists `last_known_position` asynchronously after Join, without
/// disturbing the record's remaining TTL.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn set_last_known_position(
    conn: &StoreConn,
    waiting_token: &str,
    position: u64,
) -> Result<()> {
    let Some(mut record) = get(conn, waiting_token).await? else {
        return Ok(());
    };
    record.last_known_position = Some(position);
    put(conn, &record).await
}

/// Deletes a queue record (Enter, Leave, Reclaimer).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn delete(conn: &StoreConn, waiting_token: &str) -> Result<()> {
    conn.del(&keys::queue_record(waiting_token)).await?;
    Ok(())
}

async fn set_ex(conn: &StoreConn, key: &str, payload: &[u8], ttl_secs: u64) -> Result<()> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.set_ex(key, payload, ttl_secs).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.set_ex(key, payload, ttl_secs).await?;
        }
    }
    Ok(())
}

async fn get_raw(conn: &StoreConn, key: &str) -> Result<Option<Vec<u8>>> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.get(key).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.get(key).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> QueueRecord {
        QueueRecord {
            waiting_token: "tok_test".to_string(),
            event_id: "evt_1".to_string(),
            user_id: "u1".to_string(),
            joined_at_ms: 1000,
            stream_id: "1-0".to_string(),
            last_known_position: None,
        }
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = sample_record();
        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: QueueRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(record, decoded);
    }

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_put_get_delete_round_trip() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let record = sample_record();

        put(&conn, &record).await.unwrap();
        let fetched = get(&conn, &record.waiting_token).await.unwrap();
        assert_eq!(fetched, Some(record.clone()));

        set_last_known_position(&conn, &record.waiting_token, 42)
            .await
            .unwrap();
        let fetched = get(&conn, &record.waiting_token).await.unwrap().unwrap();
        assert_eq!(fetched.last_known_position, Some(42));

        delete(&conn, &record.waiting_token).await.unwrap();
        assert_eq!(get(&conn, &record.waiting_token).await.unwrap(), None);
    }
}
