//! Per-user stream log (component C).
//!
//! An append-only log per `(event, user)` backed by a Redis stream, which
//! assigns each entry a strictly increasing id within that stream for free.
//! This sidesteps the score-collision problem a float-encoded ordered set
//! would hit under contention (see the design notes on score precision):
//! the store, not this crate, owns id assignment, so there is no precision
//! budget to exceed.
//!
//! Ordering guarantee: strict FIFO *within* one `(event, user)` stream.
//! There is no global total order across users — [`crate::position_index`]
//! provides the approximate cross-user ordering instead.

use crate::client::StoreConn;
use crate::error::Result;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;

/// One entry appended to a user's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Store-assigned id, strictly increasing within this stream.
    pub stream_id: String,
    /// Waiting token this entry corresponds to.
    pub token: String,
    /// Event id.
    pub event_id: String,
    /// User id.
    pub user_id: String,
    /// Join time, milliseconds since the Unix epoch, as a string (stream
    /// field values are always strings).
    pub ts: String,
}

/// Number of entries currently in a user's stream.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn length(conn: &StoreConn, stream_key: &str) -> Result<u64> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.xlen(stream_key).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.xlen(stream_key).await?)
        }
    }
}

/// Reads up to `count` entries starting at the stream's beginning.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn range(conn: &StoreConn, stream_key: &str, count: usize) -> Result<Vec<StreamEntry>> {
    let reply: StreamRangeReply = match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            c.xrange_count(stream_key, "-", "+", count).await?
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            c.xrange_count(stream_key, "-", "+", count).await?
        }
    };
    Ok(reply.ids.into_iter().filter_map(decode_entry).collect())
}

/// Deletes a single entry by its stream id (Enter removing a consumed
/// waiting token from its user's stream).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn delete_entry(conn: &StoreConn, stream_key: &str, stream_id: &str) -> Result<()> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: i64 = c.xdel(stream_key, &[stream_id]).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: i64 = c.xdel(stream_key, &[stream_id]).await?;
        }
    }
    Ok(())
}

/// Trims entries with an id lower than `minimum_id` (Reclaimer sweeping
/// stale entries out of a stream).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn trim_before(conn: &StoreConn, stream_key: &str, minimum_id: &str) -> Result<u64> {
    // XTRIM MINID trims everything strictly before `minimum_id`.
    let trimmed: u64 = match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            redis::cmd("XTRIM")
                .arg(stream_key)
                .arg("MINID")
                .arg(minimum_id)
                .query_async(&mut c)
                .await?
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            redis::cmd("XTRIM")
                .arg(stream_key)
                .arg("MINID")
                .arg(minimum_id)
                .query_async(&mut c)
                .await?
        }
    };
    Ok(trimmed)
}

/// Checks whether a stream still has entries; an empty stream is eligible
/// for deletion by the Reclaimer.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn is_empty(conn: &StoreConn, stream_key: &str) -> Result<bool> {
    Ok(length(conn, stream_key).await? == 0)
}

fn decode_entry(id: redis::streams::StreamId) -> Option<StreamEntry> {
    let token = field_string(&id, "token")?;
    let event_id = field_string(&id, "event_id")?;
    let user_id = field_string(&id, "user_id")?;
    let ts = field_string(&id, "ts")?;
    Some(StreamEntry {
        stream_id: id.id.clone(),
        token,
        event_id,
        user_id,
        ts,
    })
}

fn field_string(id: &redis::streams::StreamId, field: &str) -> Option<String> {
    use redis::FromRedisValue;
    id.map
        .get(field)
        .and_then(|v| String::from_redis_value(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    #[test]
    fn test_stream_key_shares_shard_with_dedupe() {
        let event_id = "evt_1";
        let stream_key = keys::user_stream(event_id, "u1");
        let dedupe = keys::dedupe_key(event_id, "idem_1");
        assert!(keys::assert_same_shard(&[&stream_key, &dedupe]).is_ok());
    }

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_append_order_is_strictly_increasing() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let stream_key = keys::user_stream(&event_id, "u1");

        let first = crate::scripts::enqueue(
            &conn,
            &keys::dedupe_key(&event_id, "k1"),
            &stream_key,
            "tok_1",
            &event_id,
            "u1",
            300,
            1,
        )
        .await
        .unwrap();
        let second = crate::scripts::enqueue(
            &conn,
            &keys::dedupe_key(&event_id, "k2"),
            &stream_key,
            "tok_2",
            &event_id,
            "u1",
            300,
            2,
        )
        .await
        .unwrap();

        let (id1, id2) = match (first, second) {
            (
                crate::scripts::EnqueueOutcome::Appended { stream_id: a },
                crate::scripts::EnqueueOutcome::Appended { stream_id: b },
            ) => (a, b),
            _ => panic!("expected both appends to succeed"),
        };
        assert!(id1 < id2);

        let entries = range(&conn, &stream_key, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
