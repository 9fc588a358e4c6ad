//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use waitline_engine::Engine;
use waitline_store::client::StoreClient;
use waitline_web::handlers::health::StorePing;

use crate::backend::{PaymentClient, ReservationClient};
use crate::config::Config;
use crate::idempotency;
use crate::jwt::JwtValidator;
use crate::rate_limit::RateLimiter;

/// Default base URL for the reservation backend when none is configured.
const DEFAULT_RESERVATION_BASE_URL: &str = "http://reservation-backend.internal";
/// Default base URL for the payment backend when none is configured.
const DEFAULT_PAYMENT_BASE_URL: &str = "http://payment-backend.internal";
/// Deadline applied to every downstream backend call.
const BACKEND_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a handler needs: the admission engine, a direct store handle
/// for the idempotency-cache (a gateway-layer concern the engine doesn't
/// know about), identity validation, the front-door limiter, and the
/// downstream backend clients.
pub struct GatewayState {
    /// Admission engine (components A-L, orchestrated by J).
    pub engine: Arc<Engine>,
    /// Direct store handle, used only for the idempotency response cache.
    pub store: StoreClient,
    /// Bearer-token validator for protected routes.
    pub jwt: Arc<JwtValidator>,
    /// Front-door (per-IP) rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Reservation backend RPC client.
    pub reservation: Arc<ReservationClient>,
    /// Payment backend RPC client.
    pub payment: Arc<PaymentClient>,
}

impl GatewayState {
    /// Assembles application state from a connected store client and the
    /// process configuration.
    #[must_use]
    pub fn new(store: StoreClient, engine: Engine, config: &Config) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            jwt: Arc::new(JwtValidator::new(config.jwt.clone())),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            reservation: Arc::new(ReservationClient::new(DEFAULT_RESERVATION_BASE_URL.to_string(), BACKEND_CALL_TIMEOUT)),
            payment: Arc::new(PaymentClient::new(DEFAULT_PAYMENT_BASE_URL.to_string(), BACKEND_CALL_TIMEOUT)),
        }
    }

    /// Scope string the idempotency cache keys entries under for a given
    /// event.
    #[must_use]
    pub fn idempotency_scope(event_id: &str) -> String {
        format!("queue:{event_id}")
    }
}

impl StorePing for GatewayState {
    async fn ping(&self) -> bool {
        self.store.ping().await
    }
}

pub use idempotency::IdempotencyCheck;
