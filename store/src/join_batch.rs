//! Join's post-enqueue batched multi-op.
//!
//! After [`crate::scripts::enqueue`] succeeds, Join writes the position
//! index entry, the compatibility set, the queue record and the heartbeat.
//! None of these writes depend on another's result, so they are batched
//! rather than promoted into a script (see the design notes on pipeline
//! batching) — but only within a shard. `position_index:{E}` and
//! `queue:event:{E}` share the `{E}` hash hint and can ride one atomic
//! pipeline; `queue:waiting:<token>`, `heartbeat:<token>` and
//! `queue:active_events` carry no hint (or a different one) and hash to
//! whatever slot their own key text lands on, so a `MULTI`/`EXEC` spanning
//! all of them would hit `CROSSSLOT` under `REDIS_CLUSTER_MODE`. Each
//! per-token/global write goes out as its own command instead.

use crate::client::StoreConn;
use crate::error::Result;
use crate::keys;
use crate::position_index::POSITION_INDEX_TTL;
use crate::queue_record::QueueRecord;
use redis::Pipeline;

/// Builds the atomic, same-shard pipeline for the event-scoped entries:
/// the position index add+expire and the compatibility set add. Both keys
/// embed the `{event_id}` hash hint, so this transaction is cluster-safe.
fn build_event_scoped_pipeline(record: &QueueRecord) -> Pipeline {
    let index_key = keys::position_index(&record.event_id);
    let compat_key = keys::event_queue_set(&record.event_id);

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let score = record.joined_at_ms as i64;

    let mut pipe = redis::pipe();
    pipe.atomic()
        .zadd(&index_key, &record.waiting_token, score)
        .ignore()
        .expire(&index_key, i64::try_from(POSITION_INDEX_TTL.as_secs()).unwrap_or(i64::MAX))
        .ignore()
        .zadd(&compat_key, &record.waiting_token, score)
        .ignore();
    pipe
}

/// Applies the post-enqueue writes for a freshly admitted token: the
/// event-scoped index/compat-set pipeline, plus the queue record,
/// heartbeat and active-event registration, each issued as its own
/// single-key command so no operation spans more than one hash slot.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure, or a
/// serialization error if `record` cannot be encoded.
pub async fn apply(conn: &StoreConn, record: &QueueRecord) -> Result<()> {
    let event_pipe = build_event_scoped_pipeline(record);
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = event_pipe.query_async(&mut c).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = event_pipe.query_async(&mut c).await?;
        }
    }

    tokio::try_join!(
        crate::queue_record::put(conn, record),
        crate::heartbeat::refresh(conn, &record.waiting_token),
        crate::events_registry::mark_active(conn, &record.event_id),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> QueueRecord {
        QueueRecord {
            waiting_token: "tok_1".to_string(),
            event_id: "evt_1".to_string(),
            user_id: "u1".to_string(),
            joined_at_ms: 1000,
            stream_id: "1-0".to_string(),
            last_known_position: None,
        }
    }

    #[test]
    fn test_event_scoped_pipeline_builds() {
        // Smoke test: just confirms the pipeline assembles without panicking.
        let _pipe = build_event_scoped_pipeline(&sample_record());
    }

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_apply_writes_all_four_entities() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let record = sample_record();

        apply(&conn, &record).await.unwrap();

        assert!(crate::queue_record::get(&conn, &record.waiting_token).await.unwrap().is_some());
        assert!(crate::heartbeat::is_alive(&conn, &record.waiting_token).await.unwrap());
        let index_key = keys::position_index(&record.event_id);
        assert_eq!(
            crate::position_index::rank(&conn, &index_key, &record.waiting_token).await.unwrap(),
            Some(0)
        );
    }
}
