//! Shard-aware key naming (component A).
//!
//! Every key that a single atomic script or pipeline touches must hash to
//! the same cluster shard. Redis Cluster (and any store that partitions by
//! hashing a substring of the key) uses the portion of the key between the
//! first `{` and the first following `}` as the sole hashing input when one
//! is present. All multi-key entities below embed the event id as that
//! hint; per-token keys (heartbeat, queue record) are touched in isolation
//! and need no hint.
//!
//! Keep this module and the call sites of [`crate::scripts`] co-located:
//! moving a script's key list out of sync with this namer is exactly the
//! class of bug this module exists to prevent.

/// Per-event compatibility ordered set retained for legacy readers.
#[must_use]
pub fn event_queue_set(event_id: &str) -> String {
    format!("queue:event:{{{event_id}}}")
}

/// Per-event position index (component D).
#[must_use]
pub fn position_index(event_id: &str) -> String {
    format!("position_index:{{{event_id}}}")
}

/// Per-(event, user) append-only stream log (component C).
#[must_use]
pub fn user_stream(event_id: &str, user_id: &str) -> String {
    format!("stream:event:{{{event_id}}}:user:{user_id}")
}

/// Idempotency dedupe marker, same shard as the user's stream (component B).
#[must_use]
pub fn dedupe_key(event_id: &str, idempotency_key: &str) -> String {
    format!("dedupe:{{{event_id}}}:{idempotency_key}")
}

/// Per-event token-bucket governor state (component H).
#[must_use]
pub fn bucket_state(event_id: &str) -> String {
    format!("bucket:{{{event_id}}}")
}

/// Per-event admission counter ordered set (component G).
#[must_use]
pub fn admission_counter(event_id: &str) -> String {
    format!("metrics:admission:{{{event_id}}}")
}

/// Per-token queue record (component E). No shard hint: touched in
/// isolation, never alongside another event's keys in one script.
#[must_use]
pub fn queue_record(waiting_token: &str) -> String {
    format!("queue:waiting:{waiting_token}")
}

/// Per-token heartbeat liveness key (component F). No shard hint, same
/// reasoning as [`queue_record`].
#[must_use]
pub fn heartbeat(waiting_token: &str) -> String {
    format!("heartbeat:{waiting_token}")
}

/// Extracts the shard hint (the substring between the first `{` and its
/// matching `}`) from a key, if present. Used by tests to assert that every
/// key list passed to one script shares a hint.
#[must_use]
pub fn shard_hint(key: &str) -> Option<&str> {
    let start = key.find('{')?;
    let rest = &key[start + 1..];
    let end = rest.find('}')?;
    Some(&rest[..end])
}

/// Asserts (for test/debug use) that every key in `keys` shares one shard
/// hint. Returns the shared hint, or an error listing the offending keys.
///
/// # Errors
///
/// Returns [`crate::StoreError::CrossSlot`] if the keys do not all embed the
/// same shard hint (including if any key embeds none at all while others
/// do).
pub fn assert_same_shard<'a>(keys: &[&'a str]) -> crate::Result<Option<&'a str>> {
    let mut hints = keys.iter().map(|k| shard_hint(k));
    let Some(first) = hints.next() else {
        return Ok(None);
    };
    if hints.all(|h| h == first) {
        Ok(first)
    } else {
        Err(crate::StoreError::CrossSlot(
            keys.iter().map(|s| (*s).to_string()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_hint_present() {
        assert_eq!(shard_hint("queue:event:{evt_1}"), Some("evt_1"));
        assert_eq!(
            shard_hint("stream:event:{evt_1}:user:u1"),
            Some("evt_1")
        );
    }

    #[test]
    fn test_shard_hint_absent() {
        assert_eq!(shard_hint("queue:waiting:tok_1"), None);
    }

    #[test]
    fn test_enqueue_keys_share_shard() {
        let dedupe = dedupe_key("evt_1", "idem_1");
        let stream = user_stream("evt_1", "u1");
        let hint = assert_same_shard(&[&dedupe, &stream]).unwrap();
        assert_eq!(hint, Some("evt_1"));
    }

    #[test]
    fn test_cross_event_keys_rejected() {
        let dedupe = dedupe_key("evt_1", "idem_1");
        let stream = user_stream("evt_2", "u1");
        let err = assert_same_shard(&[&dedupe, &stream]).unwrap_err();
        assert!(matches!(err, crate::StoreError::CrossSlot(_)));
    }

    #[test]
    fn test_per_token_keys_need_no_hint() {
        let token = "tok_abc";
        assert_eq!(shard_hint(&queue_record(token)), None);
        assert_eq!(shard_hint(&heartbeat(token)), None);
    }
}
