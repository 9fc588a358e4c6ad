//! Reclaimer (component L).
//!
//! Periodic sweep that removes queue state whose owner has stopped
//! refreshing its heartbeat, and trims stream entries past the maximum
//! queue age. Must never race with Enter: it checks heartbeat presence
//! immediately before deleting a token's state, and touches C/D/E and the
//! compatibility ordered set through the same per-token keys Enter itself
//! uses.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use waitline_store::{client::StoreConn, events_registry, heartbeat, keys, position_index, queue_record, scan, stream_log};

/// Default interval between Reclaimer passes.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum age a stream entry may reach before the Reclaimer trims it.
pub const MAX_QUEUE_AGE: Duration = Duration::from_secs(30 * 60);

/// Outcome of one sweep pass, reported to [`waitline_runtime::metrics::ReclaimerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Number of distinct events swept.
    pub events_swept: u64,
    /// Number of stale tokens removed from C/D/E/F.
    pub tokens_reclaimed: u64,
    /// Number of empty streams deleted.
    pub streams_deleted: u64,
}

/// Runs one full sweep pass across every currently-registered event.
///
/// # Errors
///
/// Returns a [`waitline_store::StoreError`] if the registry itself cannot
/// be read; per-event failures are logged and skipped so one broken event
/// does not stall the rest of the pass.
pub async fn sweep(conn: &StoreConn) -> waitline_store::Result<SweepReport> {
    let events = events_registry::list_active(conn).await?;
    let mut report = SweepReport::default();

    for event_id in events {
        match sweep_event(conn, &event_id).await {
            Ok(event_report) => {
                report.events_swept += 1;
                report.tokens_reclaimed += event_report.tokens_reclaimed;
                report.streams_deleted += event_report.streams_deleted;
            }
            Err(error) => {
                tracing::warn!(event_id = %event_id, %error, "reclaimer sweep failed for event, skipping");
            }
        }
    }

    Ok(report)
}

async fn sweep_event(conn: &StoreConn, event_id: &str) -> waitline_store::Result<SweepReport> {
    let mut report = SweepReport::default();

    // 1. Reclaim tokens whose heartbeat has expired.
    let index_key = keys::position_index(event_id);
    let compat_key = keys::event_queue_set(event_id);
    let tokens = position_index_members(conn, &index_key).await?;

    for token in tokens {
        if !heartbeat::is_alive(conn, &token).await? {
            reclaim_token(conn, &index_key, &compat_key, &token).await?;
            report.tokens_reclaimed += 1;
        }
    }

    // 2. Trim stale stream entries and delete empty streams.
    let cutoff_ms = now_ms().saturating_sub(u64::try_from(MAX_QUEUE_AGE.as_millis()).unwrap_or(u64::MAX));
    let minimum_id = format!("{cutoff_ms}-0");

    let stream_keys = scan::scan_event_streams(conn, event_id).await?;
    for stream_key in stream_keys {
        stream_log::trim_before(conn, &stream_key, &minimum_id).await?;
        if stream_log::is_empty(conn, &stream_key).await? {
            // XTRIM leaves an empty stream key behind; clean it up.
            conn.del(&stream_key).await?;
            report.streams_deleted += 1;
        }
    }

    if stream_keys_remaining(conn, event_id).await? == 0 {
        events_registry::mark_inactive(conn, event_id).await?;
    }

    Ok(report)
}

/// Removes a heartbeat-expired token from C, D, E and the compatibility
/// ordered set. The record is read first so its `stream_id` is known —
/// without it the stream entry would survive until the separate age-based
/// trim below, leaking a slot in the per-user stream for up to
/// [`MAX_QUEUE_AGE`] after the token is otherwise gone.
async fn reclaim_token(
    conn: &StoreConn,
    index_key: &str,
    compat_key: &str,
    token: &str,
) -> waitline_store::Result<()> {
    if let Some(record) = queue_record::get(conn, token).await? {
        let stream_key = keys::user_stream(&record.event_id, &record.user_id);
        stream_log::delete_entry(conn, &stream_key, &record.stream_id).await?;
    }
    position_index::remove(conn, index_key, token).await?;
    position_index::remove(conn, compat_key, token).await?;
    queue_record::delete(conn, token).await?;
    heartbeat::delete(conn, token).await?;
    Ok(())
}

/// Scans the batch-bounded stream key list one more time to decide whether
/// the event can be dropped from the active-event registry. Cheap relative
/// to a full sweep since it reuses the same bounded scan.
async fn stream_keys_remaining(conn: &StoreConn, event_id: &str) -> waitline_store::Result<usize> {
    Ok(scan::scan_event_streams(conn, event_id).await?.len())
}

async fn position_index_members(conn: &StoreConn, index_key: &str) -> waitline_store::Result<Vec<String>> {
    // Bounded by the soft cap, mirroring the stream scan above; the index
    // itself is an ordered set, not a pattern-matched key space, so a
    // direct range read (not SCAN) is the appropriate primitive here.
    use redis::AsyncCommands;
    let limit = i64::try_from(scan::MAX_STREAMS_PER_PASS).unwrap_or(i64::MAX);
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            Ok(c.zrange(index_key, 0, limit).await?)
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            Ok(c.zrange(index_key, 0, limit).await?)
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Spawns a background task that calls [`sweep`] on [`SWEEP_INTERVAL`]
/// until `shutdown` resolves. Intended to be driven from `gateway::main`
/// alongside the HTTP listener.
pub fn spawn(conn: StoreConn, mut shutdown: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = std::time::Instant::now();
                    match sweep(&conn).await {
                        Ok(report) => {
                            waitline_runtime::metrics::ReclaimerMetrics::record_sweep(
                                report.tokens_reclaimed,
                                started.elapsed(),
                            );
                            tracing::info!(?report, "reclaimer sweep completed");
                        }
                        Err(error) => {
                            tracing::error!(%error, "reclaimer sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("reclaimer stopping");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_report_accumulates() {
        let mut report = SweepReport::default();
        report.events_swept += 1;
        report.tokens_reclaimed += 3;
        assert_eq!(report.tokens_reclaimed, 3);
        assert_eq!(report.events_swept, 1);
    }

    #[test]
    fn test_max_queue_age_matches_queue_record_ttl() {
        assert_eq!(MAX_QUEUE_AGE, waitline_store::queue_record::QUEUE_RECORD_TTL);
    }
}
