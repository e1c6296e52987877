//! dev-relay: one port in front of one dev server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                  dev-relay                    │
//!   Client Request     │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!   ───────────────────┼─▶│   net    │──▶│  http    │──▶│  relay   │──┼──▶ Upstream
//!                      │  │ listener │   │  server  │   │ request  │  │
//!                      │  └──────────┘   └──────────┘   └──────────┘  │
//!   Client Response    │                 ┌──────────┐                 │
//!   ◀──────────────────┼─────────────────│ response │◀────────────────┼─── Upstream
//!                      │                 │  relay   │                 │
//!                      │                 └──────────┘                 │
//!                      │   config · lifecycle · observability         │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use clap::Parser;

use dev_relay::config::{validate_config, Cli};
use dev_relay::lifecycle::shutdown_signal;
use dev_relay::net::Listener;
use dev_relay::observability::{logging, metrics};
use dev_relay::http::ServerError;
use dev_relay::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Cli::parse().into_config();

    logging::init(&config.observability)?;

    tracing::info!("dev-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(ServerError::InvalidConfig(errors.len()));
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        connect_timeout_ms = config.timeouts.connect.as_millis() as u64,
        response_timeout_ms = config.timeouts.response_header.as_millis() as u64,
        max_connections = ?config.listener.max_connections,
        "Configuration loaded"
    );

    if let Some(addr) = &config.observability.metrics_address {
        let addr: SocketAddr = addr.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await.map_err(|e| {
        tracing::error!(error = %e, "Cannot acquire listening port");
        e
    })?;

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
