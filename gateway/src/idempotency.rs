//! Response replay cache for the `Idempotency-Key` header.
//!
//! Distinct from `waitline_store::scripts::enqueue`'s own dedupe guard
//! (component B): that one only prevents a second stream append and
//! cannot tell the difference between "retry of the exact same request"
//! and "key reused for a different request". This cache stores the first
//! response body (and a hash of the request body it was produced for) so
//! Join can tell those two cases apart and replay bit-identical output for
//! genuine retries.

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use waitline_store::client::StoreConn;

/// How long a cached response survives, matching the dedupe window an
/// idempotency key is expected to be reused within.
pub const CACHE_TTL_SECS: u64 = 5 * 60;

/// Outcome of checking the cache before processing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyCheck<T> {
    /// No prior request with this key; proceed normally.
    Fresh,
    /// The same key was used for the same body; replay this response
    /// unchanged rather than reprocessing.
    Replay(T),
    /// The same key was used for a different body.
    Conflict,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CachedEntry {
    body_hash: String,
    response: serde_json::Value,
}

fn cache_key(scope: &str, idempotency_key: &str) -> String {
    format!("idempotency:{scope}:{idempotency_key}")
}

fn hash_body(body: &impl Serialize) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(body)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks whether `idempotency_key` (scoped to `scope`, normally the event
/// id) has already been used for a request with this exact body.
///
/// # Errors
///
/// Returns a store error on a connection failure, or a decode error if a
/// cached entry is malformed (treated as data corruption, not absence).
pub async fn check<B: Serialize, T: DeserializeOwned>(
    conn: &StoreConn,
    scope: &str,
    idempotency_key: &str,
    request_body: &B,
) -> waitline_store::Result<IdempotencyCheck<T>> {
    let key = cache_key(scope, idempotency_key);
    let Some(raw) = get_raw(conn, &key).await? else {
        return Ok(IdempotencyCheck::Fresh);
    };

    let entry: CachedEntry = serde_json::from_str(&raw).map_err(waitline_store::StoreError::Decode)?;
    let incoming_hash = hash_body(request_body).map_err(waitline_store::StoreError::Decode)?;

    if entry.body_hash != incoming_hash {
        return Ok(IdempotencyCheck::Conflict);
    }

    let response: T = serde_json::from_value(entry.response).map_err(waitline_store::StoreError::Decode)?;
    Ok(IdempotencyCheck::Replay(response))
}

/// Caches `response` under `idempotency_key` for [`CACHE_TTL_SECS`], keyed
/// by a hash of `request_body` so a later conflicting reuse can be
/// detected.
///
/// # Errors
///
/// Returns a store error on a connection failure or serialization
/// failure.
pub async fn store<B: Serialize, T: Serialize>(
    conn: &StoreConn,
    scope: &str,
    idempotency_key: &str,
    request_body: &B,
    response: &T,
) -> waitline_store::Result<()> {
    let key = cache_key(scope, idempotency_key);
    let entry = CachedEntry {
        body_hash: hash_body(request_body).map_err(waitline_store::StoreError::Decode)?,
        response: serde_json::to_value(response).map_err(waitline_store::StoreError::Decode)?,
    };
    let raw = serde_json::to_string(&entry).map_err(waitline_store::StoreError::Decode)?;
    set_ex(conn, &key, &raw, CACHE_TTL_SECS).await
}

async fn get_raw(conn: &StoreConn, key: &str) -> waitline_store::Result<Option<String>> {
    use redis::AsyncCommands;
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

async fn set_ex(conn: &StoreConn, key: &str, value: &str, ttl_secs: u64) -> waitline_store::Result<()> {
    use redis::AsyncCommands;
    match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            let _: () = c.set_ex(key, value, ttl_secs).await?;
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            let _: () = c.set_ex(key, value, ttl_secs).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_scoped() {
        assert_eq!(cache_key("evt_1", "abc"), "idempotency:evt_1:abc");
    }

    #[test]
    fn test_hash_body_is_stable_for_equal_payloads() {
        let a = serde_json::json!({"event_id": "evt_1", "user_id": "u1"});
        let b = serde_json::json!({"event_id": "evt_1", "user_id": "u1"});
        assert_eq!(hash_body(&a).unwrap(), hash_body(&b).unwrap());
    }

    #[test]
    fn test_hash_body_differs_for_different_payloads() {
        let a = serde_json::json!({"event_id": "evt_1"});
        let b = serde_json::json!({"event_id": "evt_2"});
        assert_ne!(hash_body(&a).unwrap(), hash_body(&b).unwrap());
    }
}
