//! Token-bucket governor (component H).
//!
//! Per-event `{tokens, lastRefill}` state mutated by a single atomic
//! script. This is the only mutator of bucket state; it is invoked solely
//! from the eligibility decider's step 4 (positions 11..100 consult the
//! governor, VIP positions 1..10 bypass it entirely).

use crate::client::StoreConn;
use crate::error::Result;
use redis::Script;
use std::sync::LazyLock;

/// Bucket capacity.
pub const CAPACITY: f64 = 100.0;
/// Refill rate, tokens per second.
pub const REFILL_PER_SEC: f64 = 10.0;

/// `tryConsume(bucketKey; capacity, refillPerSec, now)`.
///
/// Lazily refills based on elapsed time since `lastRefill`, then attempts
/// to consume one token. Returns `{admitted, tokensRemaining}`.
static TRY_CONSUME_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local bucket_key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local refill_per_sec = tonumber(ARGV[2])
        local now = tonumber(ARGV[3])

        local state = redis.call('HMGET', bucket_key, 'tokens', 'last_refill')
        local tokens = tonumber(state[1])
        local last_refill = tonumber(state[2])

        if tokens == nil or last_refill == nil then
            tokens = capacity
            last_refill = now
        end

        local elapsed = now - last_refill
        if elapsed < 0 then
            elapsed = 0
        end
        tokens = math.min(capacity, tokens + elapsed * refill_per_sec)

        local admitted = 0
        if tokens >= 1 then
            tokens = tokens - 1
            admitted = 1
        end

        redis.call('HMSET', bucket_key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
        redis.call('EXPIRE', bucket_key, 3600)

        return {admitted, tostring(tokens)}
        ",
    )
});

/// Result of one governor consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumeResult {
    /// Whether a token was available and consumed.
    pub admitted: bool,
    /// Tokens remaining in the bucket after this attempt.
    pub tokens_remaining: f64,
}

/// Attempts to consume one token from the event's bucket, lazily refilling
/// first.
///
/// # Errors
///
/// Returns [`crate::StoreError::Redis`] on a connection failure, or a
/// decode error if the script's reply is malformed.
pub async fn try_consume(conn: &StoreConn, bucket_key: &str, now_secs: f64) -> Result<ConsumeResult> {
    let invocation = TRY_CONSUME_SCRIPT
        .key(bucket_key)
        .arg(CAPACITY)
        .arg(REFILL_PER_SEC)
        .arg(now_secs);

    let (admitted, tokens_remaining): (i64, String) = match conn {
        StoreConn::Standalone(manager) => {
            let mut c = manager.clone();
            invocation.invoke_async(&mut c).await?
        }
        StoreConn::Cluster(cluster) => {
            let mut c = cluster.clone();
            invocation.invoke_async(&mut c).await?
        }
    };

    Ok(ConsumeResult {
        admitted: admitted == 1,
        tokens_remaining: tokens_remaining.parse().unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_bucket_admits_until_exhausted_then_refills() {
        let client = crate::client::StoreClient::connect(&crate::client::ClientConfig::default())
            .await
            .unwrap();
        let conn = client.conn();
        let event_id = format!("evt_{}", uuid::Uuid::new_v4());
        let bucket_key = keys::bucket_state(&event_id);

        let mut admitted_count = 0;
        for _ in 0..100 {
            let result = try_consume(&conn, &bucket_key, 0.0).await.unwrap();
            if result.admitted {
                admitted_count += 1;
            }
        }
        assert_eq!(admitted_count, 100);

        let exhausted = try_consume(&conn, &bucket_key, 0.0).await.unwrap();
        assert!(!exhausted.admitted);

        // After 1 second, 10 tokens refill.
        let after_refill = try_consume(&conn, &bucket_key, 1.0).await.unwrap();
        assert!(after_refill.admitted);
    }
}
