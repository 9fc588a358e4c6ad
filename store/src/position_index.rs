//! Position index (component D).
//!
//! Per-event ordered set scored by join time, giving an O(log N) rank
//! lookup. This is the fast path Status relies on; the compatibility
//! ordered set at `queue:event:{E}` is read only as a fallback when a
//! token is (transiently) missing from this index.

use crate::client::StoreConn;
use crate::error::Result;
use redis::AsyncCommands;
use std::time::Duration;

/// TTL refreshed on every add (1 hour).
pub const POSITION_INDEX_TTL: Duration = Duration::from_secs(60 * 60);

/// Adds (or moves) a token in the position index with the given score
/// (join time in milliseconds), then refreshes the index's TTL.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn add(conn: &StoreConn, index_key: &str, token: &str, joined_at_ms: u64) -> Result<()> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let score = joined_at_ms as i64;
    #[allow(clippy::cast_possible_truncation)]
    let ttl = POSITION_INDEX_TTL.as_secs();
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.zadd(index_key, token, score).await?;
            let _: () = c.expire(index_key, ttl.try_into().unwrap_or(i64::MAX)).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.zadd(index_key, token, score).await?;
            let _: () = c.expire(index_key, ttl.try_into().unwrap_or(i64::MAX)).await?;
        }
    }
    Ok(())
}

/// Removes a token from the index (Enter, Leave, Reclaimer).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn remove(conn: &StoreConn, index_key: &str, token: &str) -> Result<()> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.zrem(index_key, token).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.zrem(index_key, token).await?;
        }
    }
    Ok(())
}

/// 0-based rank of `token` within the event's index, ascending by join
/// time. The client-facing position is `rank + 1`. Returns `None` if the
/// token is not present (callers should fall back to the compatibility set
/// or the queue record's advisory position).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn rank(conn: &StoreConn, index_key: &str, token: &str) -> Result<Option<u64>> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.zrank(index_key, token).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.zrank(index_key, token).await?)
        }
    }
}

/// Total number of entries in the index, used for the approximate
/// size-of-queue/2 fallback position when a token's rank cannot be found.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn size(conn: &StoreConn, index_key: &str) -> Result<u64> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.zcard(index_key).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.zcard(index_key).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_rank_reflects_join_order() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let index_key = keys::position_index(&event_id);

        add(&conn, &index_key, "tok_a", 100).await.unwrap();
        add(&conn, &index_key, "tok_b", 200).await.unwrap();
        add(&conn, &index_key, "tok_c", 300).await.unwrap();

        assert_eq!(rank(&conn, &index_key, "tok_a").await.unwrap(), Some(0));
        assert_eq!(rank(&conn, &index_key, "tok_b").await.unwrap(), Some(1));
        assert_eq!(rank(&conn, &index_key, "tok_c").await.unwrap(), Some(2));
        assert_eq!(size(&conn, &index_key).await.unwrap(), 3);

        remove(&conn, &index_key, "tok_a").await.unwrap();
        assert_eq!(rank(&conn, &index_key, "tok_b").await.unwrap(), Some(0));
        assert_eq!(rank(&conn, &index_key, "tok_missing").await.unwrap(), None);
    }
}
