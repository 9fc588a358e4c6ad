//! Eligibility decider (component I).
//!
//! Combines position, elapsed wait and (for non-VIP positions) the
//! token-bucket governor into a single admit/deny decision. The ordering
//! is deliberate and must not be reordered: position and wait floor are
//! checked first so VIP positions (1..10) never touch the governor at all.

use crate::error::EligibilityReason;
use std::time::Duration;

/// Position beyond which a token is never eligible, regardless of wait.
pub const MAX_ELIGIBLE_POSITION: u64 = 100;
/// Positions at or below this bypass the governor entirely.
pub const VIP_POSITION_THRESHOLD: u64 = 10;
/// Positions at or below this (but above the VIP threshold) wait at least 2s.
const MID_TIER_POSITION_THRESHOLD: u64 = 50;

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Eligible to enter. `vip_bypass` is `true` if the governor was not
    /// consulted (position ≤ [`VIP_POSITION_THRESHOLD`]).
    Eligible { vip_bypass: bool },
    /// Not eligible, with the reason a client should report/retry on.
    Ineligible(EligibilityReason),
}

/// The wait-time floor for a given position.
#[must_use]
pub const fn wait_floor(position: u64) -> Duration {
    if position <= VIP_POSITION_THRESHOLD {
        Duration::ZERO
    } else if position <= MID_TIER_POSITION_THRESHOLD {
        Duration::from_secs(2)
    } else {
        Duration::from_secs(5)
    }
}

/// Steps 1-3 of the decider: position window and wait floor. Does not
/// consult the governor. Returns `Ok(())` if positions 1-3 all pass
/// (meaning either the caller should go on to consult the governor, or —
/// for VIP positions — that the token is unconditionally eligible).
fn check_position_and_wait(position: u64, wait: Duration) -> Result<bool, EligibilityReason> {
    if position > MAX_ELIGIBLE_POSITION {
        return Err(EligibilityReason::Position);
    }
    if wait < wait_floor(position) {
        return Err(EligibilityReason::Wait);
    }
    Ok(position <= VIP_POSITION_THRESHOLD)
}

/// Full decision, consulting the governor via `consume_governor_token` only
/// when the position is outside the VIP bypass window. `consume_governor_token`
/// should be the token-bucket's `try_consume`; it is only invoked when
/// actually needed, so VIP admissions never touch bucket state.
///
/// # Errors
///
/// Propagates whatever error `consume_governor_token` returns (a store
/// error, typically).
pub async fn decide<F, Fut, E>(
    position: u64,
    wait: Duration,
    consume_governor_token: F,
) -> Result<Eligibility, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<bool, E>>,
{
    match check_position_and_wait(position, wait) {
        Err(reason) => Ok(Eligibility::Ineligible(reason)),
        Ok(true) => Ok(Eligibility::Eligible { vip_bypass: true }),
        Ok(false) => {
            if consume_governor_token().await? {
                Ok(Eligibility::Eligible { vip_bypass: false })
            } else {
                Ok(Eligibility::Ineligible(EligibilityReason::Rate))
            }
        }
    }
}

/// A non-consuming preview used by Status to report `ready_for_entry`.
///
/// Status must not mutate governor state just to answer a read — so for
/// positions in the governed range (11..100) this optimistically reports
/// `true` once the wait floor has elapsed, without predicting whether the
/// bucket actually has a token available. Enter still performs the
/// authoritative, consuming check; a client may occasionally see
/// `ready_for_entry: true` and then a `403 NOT_READY(rate)` on Enter under
/// heavy contention.
#[must_use]
pub fn preview(position: u64, wait: Duration) -> bool {
    check_position_and_wait(position, wait).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vip_bypasses_governor() {
        let result = decide::<_, _, std::convert::Infallible>(10, Duration::ZERO, || async {
            panic!("governor must not be consulted for VIP positions")
        })
        .await
        .unwrap();
        assert_eq!(result, Eligibility::Eligible { vip_bypass: true });
    }

    #[tokio::test]
    async fn test_position_just_above_vip_requires_wait_floor() {
        let result = decide::<_, _, std::convert::Infallible>(
            11,
            Duration::from_millis(1900),
            || async { Ok(true) },
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            Eligibility::Ineligible(EligibilityReason::Wait)
        );
    }

    #[tokio::test]
    async fn test_position_beyond_max_is_ineligible_even_with_wait() {
        let result = decide::<_, _, std::convert::Infallible>(
            101,
            Duration::from_secs(1000),
            || async { Ok(true) },
        )
        .await
        .unwrap();
        assert_eq!(
            result,
            Eligibility::Ineligible(EligibilityReason::Position)
        );
    }

    #[tokio::test]
    async fn test_governor_denial_surfaces_as_rate() {
        let result = decide::<_, _, std::convert::Infallible>(
            100,
            Duration::from_secs(10),
            || async { Ok(false) },
        )
        .await
        .unwrap();
        assert_eq!(result, Eligibility::Ineligible(EligibilityReason::Rate));
    }

    #[tokio::test]
    async fn test_governor_admits_non_vip() {
        let result = decide::<_, _, std::convert::Infallible>(
            50,
            Duration::from_secs(10),
            || async { Ok(true) },
        )
        .await
        .unwrap();
        assert_eq!(result, Eligibility::Eligible { vip_bypass: false });
    }

    #[test]
    fn test_wait_floor_tiers() {
        assert_eq!(wait_floor(1), Duration::ZERO);
        assert_eq!(wait_floor(10), Duration::ZERO);
        assert_eq!(wait_floor(11), Duration::from_secs(2));
        assert_eq!(wait_floor(50), Duration::from_secs(2));
        assert_eq!(wait_floor(51), Duration::from_secs(5));
        assert_eq!(wait_floor(100), Duration::from_secs(5));
    }

    #[test]
    fn test_preview_does_not_consult_governor() {
        assert!(preview(100, Duration::from_secs(5)));
        assert!(!preview(101, Duration::from_secs(999)));
        assert!(!preview(20, Duration::from_millis(100)));
    }
}
