//! Configuration for the admission gateway, loaded from the environment.

use std::env;
use std::time::Duration;

/// Top-level configuration, assembled once in `main` and handed to every
/// subsystem that needs it.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Store (Redis/Redis Cluster) connection configuration.
    pub redis: RedisConfig,
    /// Front-door rate limiter configuration.
    pub rate_limit: RateLimitConfig,
    /// JWT/JWKS identity validation configuration.
    pub jwt: JwtConfig,
    /// OpenTelemetry tracing configuration.
    pub observability: ObservabilityConfig,
}

/// HTTP server and shutdown configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Bind address for the Prometheus `/metrics` exporter.
    pub metrics_address: String,
    /// Grace period for in-flight requests during graceful shutdown.
    pub shutdown_timeout: Duration,
}

/// Store connection configuration, translated into
/// [`waitline_store::ClientConfig`] by `main`.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Comma-separated address list (one entry in standalone mode, the full
    /// seed list in cluster mode).
    pub addresses: Vec<String>,
    /// Explicit cluster-vs-standalone flag; never inferred from
    /// `addresses.len()` (see the store crate's `client` module doc).
    pub cluster_mode: bool,
    /// Password, if set directly or resolved via `secrets::resolve_password`.
    pub password: Option<String>,
    /// Whether to connect over TLS (`rediss://`).
    pub tls_enabled: bool,
    /// Route reads to the lowest-latency replica (cluster mode only).
    pub route_by_latency: bool,
    /// Permit reads from replicas (cluster mode only).
    pub read_only: bool,
    /// Deadline for establishing the initial connection.
    pub dial_timeout: Duration,
    /// Deadline applied to read commands.
    pub read_timeout: Duration,
    /// Deadline applied to write commands.
    pub write_timeout: Duration,
    /// Name of the secret to fetch `password` from, if not set directly.
    pub password_from_secrets: Option<String>,
    /// Cloud region the secret store lives in.
    pub aws_region: Option<String>,
    /// Named credential profile to use when fetching the secret.
    pub aws_profile: Option<String>,
}

/// Front-door rate limiter configuration (distinct from the admission
/// engine's own token-bucket governor).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained requests per second, per client.
    pub rps: f64,
    /// Burst capacity above `rps`.
    pub burst: u32,
    /// Request paths exempt from rate limiting (health/readiness probes).
    pub exempt_paths: Vec<String>,
}

/// JWT/JWKS identity validation configuration for protected routes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// JWKS endpoint used to fetch and cache signing keys.
    pub jwks_endpoint: String,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
}

/// OpenTelemetry tracing configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// OTLP collector endpoint; tracing export is disabled if unset.
    pub otlp_endpoint: Option<String>,
    /// Fraction of requests sampled, `[0.0, 1.0]`.
    pub sample_rate: f64,
    /// Whether distributed tracing export is enabled at all.
    pub tracing_enabled: bool,
}

/// Error returned by [`Config::try_from_env`] when a required variable is
/// missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

impl Config {
    /// Loads configuration from the environment, following this
    /// workspace's `env::var(...).unwrap_or_else(...)` /
    /// `.ok().and_then(|s| s.parse().ok()).unwrap_or(...)` convention for
    /// optional settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `JWT_JWKS_ENDPOINT`,
    /// `JWT_ISSUER` or `JWT_AUDIENCE` is unset; these are required because
    /// this workspace denies `clippy::expect_used`/`unwrap_used` outside
    /// tests, so there is no safe default to fall back to for identity
    /// validation.
    #[allow(clippy::too_many_lines)]
    pub fn try_from_env() -> Result<Self, ConfigError> {
        let jwt = JwtConfig {
            jwks_endpoint: env::var("JWT_JWKS_ENDPOINT").map_err(|_| ConfigError::Missing("JWT_JWKS_ENDPOINT"))?,
            issuer: env::var("JWT_ISSUER").map_err(|_| ConfigError::Missing("JWT_ISSUER"))?,
            audience: env::var("JWT_AUDIENCE").map_err(|_| ConfigError::Missing("JWT_AUDIENCE"))?,
        };

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080),
                metrics_address: env::var("METRICS_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9090".to_string()),
                shutdown_timeout: Duration::from_secs(
                    env::var("SHUTDOWN_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30),
                ),
            },
            redis: RedisConfig {
                addresses: env::var("REDIS_ADDRESS")
                    .unwrap_or_else(|_| "127.0.0.1:6379".to_string())
                    .split(',')
                    .map(str::trim)
                    .map(str::to_string)
                    .collect(),
                cluster_mode: env::var("REDIS_CLUSTER_MODE").ok().and_then(|s| s.parse().ok()).unwrap_or(false),
                password: env::var("REDIS_PASSWORD").ok(),
                tls_enabled: env::var("REDIS_TLS_ENABLED").ok().and_then(|s| s.parse().ok()).unwrap_or(false),
                route_by_latency: env::var("REDIS_ROUTE_BY_LATENCY").ok().and_then(|s| s.parse().ok()).unwrap_or(false),
                read_only: env::var("REDIS_READ_ONLY").ok().and_then(|s| s.parse().ok()).unwrap_or(false),
                dial_timeout: Duration::from_secs(
                    env::var("REDIS_DIAL_TIMEOUT").ok().and_then(|s| s.parse().ok()).unwrap_or(10),
                ),
                read_timeout: Duration::from_secs(
                    env::var("REDIS_READ_TIMEOUT").ok().and_then(|s| s.parse().ok()).unwrap_or(5),
                ),
                write_timeout: Duration::from_secs(
                    env::var("REDIS_WRITE_TIMEOUT").ok().and_then(|s| s.parse().ok()).unwrap_or(5),
                ),
                password_from_secrets: env::var("REDIS_PASSWORD_FROM_SECRETS").ok(),
                aws_region: env::var("AWS_REGION").ok(),
                aws_profile: env::var("AWS_PROFILE").ok(),
            },
            rate_limit: RateLimitConfig {
                rps: env::var("RATE_LIMIT_RPS").ok().and_then(|s| s.parse().ok()).unwrap_or(50.0),
                burst: env::var("RATE_LIMIT_BURST").ok().and_then(|s| s.parse().ok()).unwrap_or(100),
                exempt_paths: env::var("RATE_LIMIT_EXEMPT_PATHS")
                    .unwrap_or_else(|_| "/healthz,/readyz,/version,/metrics".to_string())
                    .split(',')
                    .map(str::trim)
                    .map(str::to_string)
                    .collect(),
            },
            jwt,
            observability: ObservabilityConfig {
                otlp_endpoint: env::var("OBSERVABILITY_OTLP_ENDPOINT").ok(),
                sample_rate: env::var("OBSERVABILITY_SAMPLE_RATE").ok().and_then(|s| s.parse().ok()).unwrap_or(0.1),
                tracing_enabled: env::var("OBSERVABILITY_TRACING_ENABLED").ok().and_then(|s| s.parse().ok()).unwrap_or(false),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_var_error_message() {
        let error = ConfigError::Missing("JWT_JWKS_ENDPOINT");
        assert_eq!(error.to_string(), "missing required environment variable: JWT_JWKS_ENDPOINT");
    }
}
