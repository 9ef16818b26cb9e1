// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleetgate: package registry, operator auth and deploy broadcast gateway.

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod deploy;
pub mod error;
pub mod gateway;
pub mod persist;
pub mod process;
pub mod registry;
pub mod report;
pub mod token;
pub mod transport;
pub mod upstream;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::transport::{build_router, ServerState};
use crate::upstream::health::spawn_health_sweep;

/// Run the gateway until Ctrl-C or SIGTERM.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let gateway = Arc::new(Gateway::from_config(&config, shutdown.clone())?);

    if let Some(interval) = config.health_sweep_interval() {
        tracing::info!(interval_ms = interval.as_millis() as u64, "periodic health sweep enabled");
        spawn_health_sweep(
            Arc::clone(gateway.registry()),
            gateway.client().clone(),
            interval,
            shutdown.clone(),
        );
    }

    let router = build_router(ServerState::new(Arc::clone(&gateway), config.max_artifact_bytes));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("fleetgate listening on {addr}");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    gateway.tokens().shutdown();
    tracing::info!("fleetgate stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGTERM or SIGINT.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGTERM");
            }
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => {
                tracing::info!("received SIGINT");
            }
        }
        shutdown.cancel();
    });
}
