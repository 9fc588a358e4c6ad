//! JWT/JWKS identity validation for protected routes.
//!
//! Out of scope for the admission engine itself (the engine only knows
//! waiting tokens, never caller identity) but required at the HTTP edge:
//! every write operation authenticates its caller against the configured
//! JWKS endpoint before the request reaches a handler. The key set is
//! fetched once and cached for an hour rather than refetched per request.

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::JwtConfig;

const JWKS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Standard claims this gateway requires of every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the authenticated caller's id).
    pub sub: String,
    /// Issuer, checked against [`JwtConfig::issuer`].
    pub iss: String,
    /// Audience, checked against [`JwtConfig::audience`].
    pub aud: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Fetches, caches and validates bearer tokens against a JWKS endpoint.
pub struct JwtValidator {
    config: JwtConfig,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
}

/// Errors raised while validating a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// The `Authorization` header was missing, not a bearer token, or the
    /// token was malformed.
    #[error("missing or malformed bearer token")]
    MalformedToken,
    /// No JWKS key matched the token's `kid`.
    #[error("no matching signing key for this token")]
    UnknownKey,
    /// Signature, issuer, audience or expiry validation failed.
    #[error("token validation failed: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    /// The JWKS endpoint could not be reached or returned malformed JSON.
    #[error("failed to fetch signing keys: {0}")]
    JwksFetch(#[from] reqwest::Error),
}

impl JwtValidator {
    /// Builds a validator for `config`'s JWKS endpoint. The key set is not
    /// fetched until the first [`validate`](Self::validate) call.
    #[must_use]
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Validates `token`, returning its claims on success.
    ///
    /// # Errors
    ///
    /// See [`JwtError`]'s variants.
    pub async fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let header = decode_header(token).map_err(|_| JwtError::MalformedToken)?;
        let kid = header.kid.ok_or(JwtError::MalformedToken)?;

        let jwks = self.cached_jwks().await?;
        let jwk = jwks.find(&kid).ok_or(JwtError::UnknownKey)?;

        let AlgorithmParameters::RSA(rsa) = &jwk.algorithm else {
            return Err(JwtError::UnknownKey);
        };
        let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    async fn cached_jwks(&self) -> Result<JwkSet, JwtError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys: JwkSet = self
            .http_client
            .get(&self.config.jwks_endpoint)
            .send()
            .await?
            .json()
            .await?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks { keys: keys.clone(), fetched_at: Instant::now() });
        Ok(keys)
    }
}

/// Extracts a bearer token from an `Authorization` header value.
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}
