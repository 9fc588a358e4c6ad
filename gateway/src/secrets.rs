//! Store credential resolution.
//!
//! The gateway accepts the store password directly (`REDIS_PASSWORD`) for
//! local development, or a secret name to resolve at startup
//! (`REDIS_PASSWORD_FROM_SECRETS`, `AWS_REGION`, `AWS_PROFILE`) for
//! deployed environments. No AWS SDK is wired in here: resolving a secret
//! name against a real secret store is an external-collaborator concern
//! this crate only defines the seam for, via [`SecretsProvider`].

use crate::config::RedisConfig;

/// Resolves a named secret to its current value.
///
/// Production deployments implement this against their cloud secret
/// store; the default env-var provider below is what local development
/// and tests use.
pub trait SecretsProvider: Send + Sync {
    /// Fetches `name`, or `None` if it does not exist or the provider has
    /// no opinion on it.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Resolves a secret name directly from the process environment. Used
/// when no cloud secret store is configured, and as the provider tests
/// exercise `resolve_password` against.
pub struct EnvSecretsProvider;

impl SecretsProvider for EnvSecretsProvider {
    fn resolve(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Resolves the store password: `REDIS_PASSWORD` if set directly, else
/// `provider.resolve(REDIS_PASSWORD_FROM_SECRETS)` if a secret name was
/// configured, else `None` (no AUTH).
#[must_use]
pub fn resolve_password(redis: &RedisConfig, provider: &dyn SecretsProvider) -> Option<String> {
    redis
        .password
        .clone()
        .or_else(|| redis.password_from_secrets.as_deref().and_then(|name| provider.resolve(name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(Option<String>);

    impl SecretsProvider for StaticProvider {
        fn resolve(&self, _name: &str) -> Option<String> {
            self.0.clone()
        }
    }

    fn base_config() -> RedisConfig {
        RedisConfig {
            addresses: vec!["127.0.0.1:6379".to_string()],
            cluster_mode: false,
            password: None,
            tls_enabled: false,
            route_by_latency: false,
            read_only: false,
            dial_timeout: std::time::Duration::from_secs(10),
            read_timeout: std::time::Duration::from_secs(5),
            write_timeout: std::time::Duration::from_secs(5),
            password_from_secrets: None,
            aws_region: None,
            aws_profile: None,
        }
    }

    #[test]
    fn test_direct_password_wins_over_secrets() {
        let mut config = base_config();
        config.password = Some("direct".to_string());
        config.password_from_secrets = Some("ignored-secret".to_string());
        let provider = StaticProvider(Some("from-secret".to_string()));
        assert_eq!(resolve_password(&config, &provider), Some("direct".to_string()));
    }

    #[test]
    fn test_falls_back_to_secrets_provider() {
        let mut config = base_config();
        config.password_from_secrets = Some("waitline/redis-password".to_string());
        let provider = StaticProvider(Some("from-secret".to_string()));
        assert_eq!(resolve_password(&config, &provider), Some("from-secret".to_string()));
    }

    #[test]
    fn test_no_password_configured_is_none() {
        let config = base_config();
        let provider = StaticProvider(None);
        assert_eq!(resolve_password(&config, &provider), None);
    }
}
