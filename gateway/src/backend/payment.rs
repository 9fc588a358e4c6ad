//! RPC client for the payment backend.
//!
//! Charges a reservation id produced by [`super::reservation::ReservationClient::redeem`].
//! Kept separate from the reservation client because the two backends are
//! independently deployed systems in the environment this gateway targets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body sent to the payment backend.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest<'a> {
    /// Reservation id returned by the reservation backend.
    pub reservation_id: &'a str,
}

/// Response from a successful charge.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeResponse {
    /// Backend-assigned payment confirmation id.
    pub payment_id: String,
}

/// Errors raised while talking to the payment backend.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The backend did not respond within the configured deadline.
    #[error("payment backend timed out")]
    Timeout,
    /// The charge was declined.
    #[error("payment declined: {0}")]
    Declined(String),
    /// A transport-level failure (DNS, connection reset, TLS).
    #[error("payment backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Thin RPC client for the payment backend.
pub struct PaymentClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl PaymentClient {
    /// Builds a client targeting `base_url`, bounding every call to
    /// `timeout`.
    #[must_use]
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self { http_client: reqwest::Client::new(), base_url, timeout }
    }

    /// Charges `reservation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Timeout`] if the backend does not answer
    /// within this client's configured timeout, [`PaymentError::Declined`]
    /// if the charge is declined, or [`PaymentError::Transport`] on any
    /// other request failure.
    pub async fn charge(&self, reservation_id: &str) -> Result<ChargeResponse, PaymentError> {
        let response = self
            .http_client
            .post(format!("{}/payments/charge", self.base_url))
            .timeout(self.timeout)
            .json(&ChargeRequest { reservation_id })
            .send()
            .await
            .map_err(|err| if err.is_timeout() { PaymentError::Timeout } else { PaymentError::Transport(err) })?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Declined(body));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_stores_base_url() {
        let client = PaymentClient::new("https://payments.internal".to_string(), Duration::from_secs(2));
        assert_eq!(client.base_url, "https://payments.internal");
    }
}
