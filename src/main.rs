mod base_uri;
mod classify;
mod codec;
mod config;
mod consumer;
mod error;
mod format;
mod http;
mod kafka;
mod producer;
mod registry;
mod telemetry;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use crate::config::{Cli, Config};
use crate::kafka::rdkafka_impl::RdKafkaHandleFactory;
use crate::registry::SessionRegistry;

/// Main entry point for the bridge.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dot_env_result = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::new(cli).context("build application configuration")?;

    telemetry::init(&config.log);

    match dot_env_result {
        Ok(path) => tracing::info!(".env file loaded from {}", path.display()),
        Err(e) => match e {
            dotenvy::Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no .env file found")
            }
            _ => tracing::warn!("failed to load .env file: {}", e),
        },
    }

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(bridge_id = %config.bridge_id, "starting kafka-bridge");

    let factory = RdKafkaHandleFactory::new(config.bootstrap_servers.clone());

    let registry = SessionRegistry::new(
        factory,
        config.bridge_id.clone(),
        Duration::from_secs(config.idle_timeout_seconds),
        config.default_poll_timeout_ms,
        config.default_max_response_bytes,
    );

    registry.spawn_idle_expiry();

    let router = http::router(registry.clone(), &config.cors);

    let listener = TcpListener::bind(&config.http_listen_addr)
        .await
        .with_context(|| format!("bind HTTP listener on {}", config.http_listen_addr))?;

    tracing::info!(addr = %config.http_listen_addr, "listening");

    http::serve(listener, router, registry, shutdown_signal()).await?;

    Ok(())
}

/// Resolves once SIGINT or (on Unix) SIGTERM is received, used to trigger graceful shutdown
/// (§4.6, §10.5).
async fn shutdown_signal() {
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
