//! RPC client for the ticket reservation backend.
//!
//! Redeems a `reservation_token` minted by [`waitline_engine::Engine::enter`]
//! for an actual seat hold. The engine itself never calls this: it only
//! mints the token and leaves redemption to the caller's own request to
//! this backend, matching the out-of-scope boundary drawn around the
//! reservation/payment systems.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body sent to the reservation backend to redeem a token.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemRequest<'a> {
    /// Reservation token minted by a successful Enter.
    pub reservation_token: &'a str,
    /// Event the reservation is scoped to.
    pub event_id: &'a str,
}

/// Response from a successful reservation redemption.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemResponse {
    /// Backend-assigned reservation id, used by the payment client.
    pub reservation_id: String,
}

/// Errors raised while talking to the reservation backend.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    /// The backend did not respond within the configured deadline.
    #[error("reservation backend timed out")]
    Timeout,
    /// The reservation token was rejected (expired, already redeemed, or
    /// unknown).
    #[error("reservation token rejected: {0}")]
    Rejected(String),
    /// A transport-level failure (DNS, connection reset, TLS).
    #[error("reservation backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin RPC client for the reservation backend.
pub struct ReservationClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReservationClient {
    /// Builds a client targeting `base_url`, bounding every call to
    /// `timeout`.
    #[must_use]
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self { http_client: reqwest::Client::new(), base_url, timeout }
    }

    /// Redeems `reservation_token` for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Timeout`] if the backend does not answer
    /// within this client's configured timeout, [`ReservationError::Rejected`]
    /// if the backend declines the token, or [`ReservationError::Transport`]
    /// on any other request failure.
    pub async fn redeem(&self, reservation_token: &str, event_id: &str) -> Result<RedeemResponse, ReservationError> {
        let response = self
            .http_client
            .post(format!("{}/reservations/redeem", self.base_url))
            .timeout(self.timeout)
            .json(&RedeemRequest { reservation_token, event_id })
            .send()
            .await
            .map_err(|err| if err.is_timeout() { ReservationError::Timeout } else { ReservationError::Transport(err) })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReservationError::Rejected(body));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_stores_base_url() {
        let client = ReservationClient::new("https://reservations.internal".to_string(), Duration::from_secs(2));
        assert_eq!(client.base_url, "https://reservations.internal");
    }
}
