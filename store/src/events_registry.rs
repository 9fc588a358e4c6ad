//! Active-event registry.
//!
//! Not one of the core admission-engine entities, but a small
//! necessity the Reclaimer needs: it sweeps "per event", which requires
//! knowing which events currently have live queues. Enumerating all keys
//! to discover events is exactly the forbidden O(N) pattern (see the
//! design notes), so instead Join/Enter maintain a tiny set of event ids
//! with active queues, and the Reclaimer cursor-scans only within one
//! event's own key prefix.

use crate::client::StoreConn;
use crate::error::Result;
use redis::AsyncCommands;

const ACTIVE_EVENTS_KEY: &str = "queue:active_events";

/// Registers an event as having at least one live queue entry. Idempotent.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn mark_active(conn: &StoreConn, event_id: &str) -> Result<()> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.sadd(ACTIVE_EVENTS_KEY, event_id).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.sadd(ACTIVE_EVENTS_KEY, event_id).await?;
        }
    }
    Ok(())
}

/// Removes an event from the registry, called by the Reclaimer once an
/// event's streams are all empty.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn mark_inactive(conn: &StoreConn, event_id: &str) -> Result<()> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.srem(ACTIVE_EVENTS_KEY, event_id).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.srem(ACTIVE_EVENTS_KEY, event_id).await?;
        }
    }
    Ok(())
}

/// Lists all currently-active event ids. Bounded by the number of distinct
/// events with live queues, not by queue depth — safe to call on every
/// Reclaimer pass.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn list_active(conn: &StoreConn) -> Result<Vec<String>> {
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.smembers(ACTIVE_EVENTS_KEY).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.smembers(ACTIVE_EVENTS_KEY).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_mark_active_then_inactive() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());

        mark_active(&conn, &event_id).await.unwrap();
        assert!(list_active(&conn).await.unwrap().contains(&event_id));

        mark_inactive(&conn, &event_id).await.unwrap();
        assert!(!list_active(&conn).await.unwrap().contains(&event_id));
    }
}
