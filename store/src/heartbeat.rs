//! Heartbeat registry (component F).
//!
//! A per-token liveness key with a 5-minute TTL. Its *absence* is
//! authoritative proof that the Reclaimer may remove the token; there is no
//! explicit "dead" marker, only expiry.

use crate::client::StoreConn;
use crate::error::Result;
use crate::keys;
use redis::AsyncCommands;
use std::time::Duration;

/// Heartbeat TTL.
pub const HEARTBEAT_TTL: Duration = Duration::from_secs(5 * 60);

/// Sets (or refreshes) a token's heartbeat. Called on Join and on every
/// Status call.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn refresh(conn: &StoreConn, waiting_token: &str) -> Result<()> {
    let key = keys::heartbeat(waiting_token);
    #[allow(clippy::cast_possible_truncation)]
    let ttl = HEARTBEAT_TTL.as_secs();
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.set_ex(&key, "alive", ttl).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.set_ex(&key, "alive", ttl).await?;
        }
    }
    Ok(())
}

/// `true` if the token's heartbeat is still present.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn is_alive(conn: &StoreConn, waiting_token: &str) -> Result<bool> {
    conn.exists(&keys::heartbeat(waiting_token)).await
}

/// Deletes a token's heartbeat (Enter, Leave).
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn delete(conn: &StoreConn, waiting_token: &str) -> Result<()> {
    conn.del(&keys::heartbeat(waiting_token)).await?;
    Ok(())
}
