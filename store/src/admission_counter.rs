//! Admission rate meter (component G).
//!
//! Per-event ordered set of `(userId, admissionTs)` pairs, trimmed lazily
//! to the last hour. `waitline-engine` builds the weighted ETA estimate
//! (component H.4) on top of the window counts this module returns; the
//! store layer only knows how to record and count, not how to weight.

use crate::client::StoreConn;
use crate::error::Result;
use redis::AsyncCommands;

/// Entries older than this are dropped on every [`record`] call.
pub const RETENTION_SECS: i64 = 60 * 60;

/// Records one admission at `now_secs` and lazily trims anything older
/// than [`RETENTION_SECS`]. `admission_id` must be unique per admission —
/// two admissions for the same user in the same second are common (shared
/// anonymous user id, flash-sale bursts) and would otherwise collapse onto
/// one `ZADD` member and silently undercount.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn record(
    conn: &StoreConn,
    counter_key: &str,
    user_id: &str,
    admission_id: &str,
    now_secs: i64,
) -> Result<()> {
    let member = format!("{user_id}:{now_secs}:{admission_id}");
    let cutoff = now_secs - RETENTION_SECS;
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = redis::pipe()
                .atomic()
                .zadd(counter_key, member, now_secs)
                .ignore()
                .zrembyscore(counter_key, 0, cutoff)
                .ignore()
                .expire(counter_key, RETENTION_SECS)
                .ignore()
                .query_async(&mut c)
                .await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = redis::pipe()
                .atomic()
                .zadd(counter_key, member, now_secs)
                .ignore()
                .zrembyscore(counter_key, 0, cutoff)
                .ignore()
                .expire(counter_key, RETENTION_SECS)
                .ignore()
                .query_async(&mut c)
                .await?;
        }
    }
    Ok(())
}

/// Counts admissions in the half-open window `(now_secs - window_secs,
/// now_secs]`.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn count_in_window(
    conn: &StoreConn,
    counter_key: &str,
    now_secs: i64,
    window_secs: i64,
) -> Result<u64> {
    let window_start = now_secs - window_secs;
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.zcount(counter_key, window_start, now_secs).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.zcount(counter_key, window_start, now_secs).await?)
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
    async fn test_record_and_count_in_window() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let counter_key = keys::admission_counter(&event_id);

        record(&conn, &counter_key, "u1", "adm_1", 1_000).await.unwrap();
        record(&conn, &counter_key, "u2", "adm_2", 1_030).await.unwrap();
        record(&conn, &counter_key, "u3", "adm_3", 1_090).await.unwrap();

        let last_minute = count_in_window(&conn, &counter_key, 1_090, 60).await.unwrap();
        assert_eq!(last_minute, 2);

        let last_15min = count_in_window(&conn, &counter_key, 1_090, 900).await.unwrap();
        assert_eq!(last_15min, 3);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_same_user_same_second_does_not_collapse() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let counter_key = keys::admission_counter(&event_id);

        // Two distinct admissions for the shared anonymous user, same second.
        record(&conn, &counter_key, "anonymous", "adm_a", 2_000).await.unwrap();
        record(&conn, &counter_key, "anonymous", "adm_b", 2_000).await.unwrap();

        let count = count_in_window(&conn, &counter_key, 2_000, 60).await.unwrap();
        assert_eq!(count, 2);
    }
}
