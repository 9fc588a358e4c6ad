//! Store connection management.
//!
//! Wraps either a standalone [`ConnectionManager`] or a
//! [`ClusterConnection`], selected by an **explicit** configuration flag.
//! A client that infers cluster-vs-standalone from the number of addresses
//! silently degrades a single cluster configuration endpoint to standalone
//! mode, which breaks every multi-key script in this crate without any
//! visible error. `ClientConfig::cluster_mode` must be set deliberately;
//! there is no address-count heuristic here.

use crate::error::{Result, StoreError};
use redis::aio::ConnectionManager;
use redis::cluster_async::ClusterConnection;
use redis::cluster::ClusterClientBuilder;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Connection parameters for [`StoreClient::connect`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// One address in standalone mode, or the full seed list in cluster
    /// mode (e.g. `["redis://node-a:6379", "redis://node-b:6379"]`).
    pub addresses: Vec<String>,
    /// Must be set explicitly; never inferred from `addresses.len()`.
    pub cluster_mode: bool,
    /// Password, if the store requires `AUTH`.
    pub password: Option<String>,
    /// Whether to connect over TLS (`rediss://`).
    pub tls_enabled: bool,
    /// Route read commands to the replica with the lowest latency
    /// (cluster mode only).
    pub route_by_latency: bool,
    /// Permit reads from replicas (cluster mode only).
    pub read_only: bool,
    /// Deadline for establishing the initial connection.
    pub dial_timeout: Duration,
    /// Deadline applied to read commands.
    pub read_timeout: Duration,
    /// Deadline applied to write commands.
    pub write_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["redis://127.0.0.1:6379".to_string()],
            cluster_mode: false,
            password: None,
            tls_enabled: false,
            route_by_latency: false,
            read_only: false,
            dial_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    fn scheme(&self) -> &'static str {
        if self.tls_enabled {
            "rediss"
        } else {
            "redis"
        }
    }

    fn addressed_url(&self, address: &str) -> String {
        if address.contains("://") {
            return address.to_string();
        }
        format!("{}://{}", self.scheme(), address)
    }
}

/// Either half of the standalone/cluster split. Both variants implement
/// Redis's async command traits, so callers match once here and every
/// higher-level module in this crate is written against `StoreConn`
/// without caring which mode is active.
#[derive(Clone)]
pub enum StoreConn {
    /// Single-node (or simple primary/replica) deployment.
    Standalone(ConnectionManager),
    /// Redis Cluster deployment.
    Cluster(ClusterConnection),
}

/// Entry point for all store access. Cheap to clone (both inner
/// connection types are internally reference-counted), so handlers hold an
/// `Arc<StoreClient>` or a plain clone per request, matching the
/// `ConnectionManager` convention used elsewhere in this workspace.
#[derive(Clone)]
pub struct StoreClient {
    conn: StoreConn,
}

impl StoreClient {
    /// Connects according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] if the client cannot be constructed or
    /// the initial connection cannot be established within
    /// `config.dial_timeout`.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let conn = if config.cluster_mode {
            Self::connect_cluster(config).await?
        } else {
            Self::connect_standalone(config).await?
        };
        Ok(Self { conn })
    }

    async fn connect_standalone(config: &ClientConfig) -> Result<StoreConn> {
        let address = config
            .addresses
            .first()
            .ok_or_else(|| StoreError::ScriptFailure("no Redis address configured".to_string()))?;
        let url = config.addressed_url(address);
        let client = Client::open(url)?;
        let manager = tokio::time::timeout(config.dial_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(config.dial_timeout))??;
        Ok(StoreConn::Standalone(manager))
    }

    async fn connect_cluster(config: &ClientConfig) -> Result<StoreConn> {
        let urls: Vec<String> = config
            .addresses
            .iter()
            .map(|a| config.addressed_url(a))
            .collect();
        let mut builder = ClusterClientBuilder::new(urls)
            .read_from_replicas_when(config.read_only)
            .retries(3);
        if config.route_by_latency {
            builder = builder.read_from_replicas_when(true);
        }
        if let Some(password) = &config.password {
            builder = builder.password(password.clone());
        }
        let client = builder.build()?;
        let conn = tokio::time::timeout(config.dial_timeout, client.get_async_connection())
            .await
            .map_err(|_| StoreError::Timeout(config.dial_timeout))??;
        Ok(StoreConn::Cluster(conn))
    }

    /// Cheap round-trip used by the readiness probe
    /// (`waitline_web::handlers::StorePing`). Returns `false` rather than
    /// an error on any failure; callers wrap this with their own deadline.
    pub async fn ping(&self) -> bool {
        match &self.conn {
            StoreConn::Standalone(manager) => {
                let mut conn = manager.clone();
                redis::cmd("PING")
                    .query_async::<_, String>(&mut conn)
                    .await
                    .is_ok()
            }
            StoreConn::Cluster(cluster) => {
                let mut conn = cluster.clone();
                redis::cmd("PING")
                    .query_async::<_, String>(&mut conn)
                    .await
                    .is_ok()
            }
        }
    }

    /// Returns a clone of the underlying connection for use by the
    /// higher-level modules in this crate (stream log, position index,
    /// queue record, ...).
    #[must_use]
    pub fn conn(&self) -> StoreConn {
        self.conn.clone()
    }
}

impl StoreConn {
    /// Runs a simple `EXISTS` check, used by several TTL-keyed lookups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] on a connection failure.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self {
            Self::Standalone(manager) => {
                let mut conn = manager.clone();
                Ok(conn.exists(key).await?)
            }
            Self::Cluster(cluster) => {
                let mut conn = cluster.clone();
                Ok(conn.exists(key).await?)
            }
        }
    }

    /// Deletes a key unconditionally. Returns the number of keys removed
    /// (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] on a connection failure.
    pub async fn del(&self, key: &str) -> Result<u64> {
        match self {
            Self::Standalone(manager) => {
                let mut conn = manager.clone();
                Ok(conn.del(key).await?)
            }
            Self::Cluster(cluster) => {
                let mut conn = cluster.clone();
                Ok(conn.del(key).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_standalone() {
        let config = ClientConfig::default();
        assert!(!config.cluster_mode);
        assert_eq!(config.addresses.len(), 1);
    }

    #[test]
    fn test_addressed_url_adds_scheme() {
        let config = ClientConfig::default();
        assert_eq!(
            config.addressed_url("127.0.0.1:6379"),
            "redis://127.0.0.1:6379"
        );
    }

    #[test]
    fn test_addressed_url_respects_tls() {
        let mut config = ClientConfig::default();
        config.tls_enabled = true;
        assert_eq!(
            config.addressed_url("127.0.0.1:6379"),
            "rediss://127.0.0.1:6379"
        );
    }

    #[test]
    fn test_addressed_url_passthrough_when_scheme_present() {
        let config = ClientConfig::default();
        assert_eq!(
            config.addressed_url("redis://node-a:6379"),
            "redis://node-a:6379"
        );
    }

    // Live-Redis integration tests below require a running instance:
    //   docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_connect_and_ping_standalone() {
        let config = ClientConfig::default();
        let client = StoreClient::connect(&config).await.unwrap();
        assert!(client.ping().await);
    }
}
