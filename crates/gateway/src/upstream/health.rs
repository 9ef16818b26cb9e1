// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health sweeps over every registered package.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{broadcast, Tally, TallyReport};
use crate::error::GatewayError;
use crate::registry::{run_blocking, PackageStatus, Registry};
use crate::upstream::client::PackageClient;

/// Probe every package concurrently, write Alive/Dead into the registry and
/// persist once after the join.
pub async fn refresh_health(
    registry: &Arc<Registry>,
    client: &PackageClient,
) -> Result<TallyReport, GatewayError> {
    let summary = run_blocking(registry, Registry::find_all).await?;
    let endpoints: Vec<String> = summary.packages().map(|p| p.endpoint.clone()).collect();
    if endpoints.is_empty() {
        return Ok(TallyReport { total: 0, succeeded: 0, failed: 0 });
    }

    let tally = Tally::new();
    let outcomes = Arc::new(Mutex::new(Vec::with_capacity(endpoints.len())));
    let units = endpoints.into_iter().map(|endpoint| {
        let client = client.clone();
        let tally = Arc::clone(&tally);
        let outcomes = Arc::clone(&outcomes);
        async move {
            let status = match client.probe(&endpoint).await {
                Ok(()) => PackageStatus::Alive,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, err = %e, "health probe failed");
                    PackageStatus::Dead
                }
            };
            tally.record(status == PackageStatus::Alive);
            outcomes.lock().push((endpoint, status));
        }
    });

    let report = broadcast(units, |total| tally.finish(total)).await;
    let outcomes = std::mem::take(&mut *outcomes.lock());
    run_blocking(registry, move |r| r.apply_health(&outcomes)).await??;
    tracing::debug!(total = report.total, alive = report.succeeded, "health refreshed");
    Ok(report)
}

/// Spawn a background task that refreshes health every `interval` until
/// `shutdown` is cancelled.
pub fn spawn_health_sweep(
    registry: Arc<Registry>,
    client: PackageClient,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(e) = refresh_health(&registry, &client).await {
                tracing::warn!(err = %e, "periodic health sweep failed");
            }
        }
    });
}
