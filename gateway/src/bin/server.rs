//! Process entry point: load configuration, connect to the store, spawn
//! the reclaimer and metrics exporter, and serve the admission gateway's
//! HTTP surface until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use waitline_engine::Engine;
use waitline_gateway::config::Config;
use waitline_gateway::router;
use waitline_gateway::secrets::{resolve_password, EnvSecretsProvider};
use waitline_gateway::state::GatewayState;
use waitline_runtime::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use waitline_runtime::metrics::MetricsServer;
use waitline_store::{ClientConfig, StoreClient};

/// Circuit breaker tuning: 5 consecutive failures trips the breaker open,
/// 10s before a half-open probe, 3 consecutive successes to close again.
fn breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .failure_threshold(5)
        .timeout(Duration::from_secs(10))
        .success_threshold(3)
        .build()
}

fn client_config(config: &Config) -> ClientConfig {
    let password = resolve_password(&config.redis, &EnvSecretsProvider);
    ClientConfig {
        addresses: config.redis.addresses.clone(),
        cluster_mode: config.redis.cluster_mode,
        password,
        tls_enabled: config.redis.tls_enabled,
        route_by_latency: config.redis.route_by_latency,
        read_only: config.redis.read_only,
        dial_timeout: config.redis.dial_timeout,
        read_timeout: config.redis.read_timeout,
        write_timeout: config.redis.write_timeout,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,waitline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::try_from_env().map_err(anyhow::Error::from)?;

    let mut metrics_server = MetricsServer::new(config.server.metrics_address.parse()?);
    if let Err(error) = metrics_server.start() {
        tracing::warn!(%error, "failed to start metrics exporter, continuing without it");
    }

    let store = StoreClient::connect(&client_config(&config)).await?;
    let breaker = CircuitBreaker::new(breaker_config());
    let engine = Engine::new(store.conn(), breaker);

    let state = Arc::new(GatewayState::new(store.clone(), engine, &config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reclaimer_handle = waitline_engine::reclaimer::spawn(store.conn(), shutdown_rx);

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "admission gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx, config.server.shutdown_timeout))
        .await?;

    reclaimer_handle.await?;
    Ok(())
}

/// Waits for SIGINT/SIGTERM, then tells the reclaimer to stop and gives
/// in-flight requests `grace` to finish before `axum::serve` returns.
async fn shutdown_signal(reclaimer_stop: watch::Sender<bool>, grace: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    let _ = reclaimer_stop.send(true);
    tokio::time::sleep(grace).await;
}
