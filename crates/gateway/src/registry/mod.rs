// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package registry: persisted group → package hierarchy.
//!
//! Every operation, reads included, goes through one lock. Mutations are
//! staged on a copy, persisted as a full snapshot, then committed, so a
//! failed write leaves the in-memory registry untouched and a reader never
//! sees counters that disagree with the package list.
//!
//! Calls that touch durable storage block; async callers go through
//! [`run_blocking`].

pub mod model;
pub mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::GatewayError;
pub use crate::registry::model::{
    Group, Package, PackageStatus, Platform, Point, Registration, SaveOutcome, Summary,
};
pub use crate::registry::store::{JsonFileStore, MemoryStore, SnapshotStore};

/// The package registry.
pub struct Registry {
    summary: Mutex<Summary>,
    store: Box<dyn SnapshotStore>,
}

impl Registry {
    /// Load the registry from `store`, creating and persisting an empty
    /// snapshot when the store holds nothing yet.
    pub fn open(store: impl SnapshotStore + 'static) -> anyhow::Result<Self> {
        let summary = match store.load()? {
            Some(mut summary) => {
                summary.recount();
                tracing::info!(
                    groups = summary.group_count,
                    packages = summary.package_count,
                    "registry loaded"
                );
                summary
            }
            None => {
                let summary = Summary::default();
                store.save(&summary)?;
                tracing::info!("created empty registry snapshot");
                summary
            }
        };
        Ok(Self { summary: Mutex::new(summary), store: Box::new(store) })
    }

    /// Current summary, reloaded from durable storage.
    ///
    /// A failed reload serves the last known in-memory summary.
    pub fn find_all(&self) -> Summary {
        let mut current = self.summary.lock();
        match self.store.load() {
            Ok(Some(mut fresh)) => {
                fresh.recount();
                *current = fresh;
            }
            Ok(None) => {
                tracing::warn!("registry snapshot missing, serving in-memory copy");
            }
            Err(e) => {
                tracing::warn!(err = %e, "registry reload failed, serving in-memory copy");
            }
        }
        current.clone()
    }

    /// Current in-memory summary without touching durable storage.
    pub fn snapshot(&self) -> Summary {
        self.summary.lock().clone()
    }

    /// Exact case-insensitive match on `(host, name)`. An empty host
    /// resolves to the sole registered package, if there is exactly one.
    pub fn find_by_point(&self, point: &Point) -> Option<Package> {
        let summary = self.summary.lock();
        if point.is_empty() {
            return summary.sole_package().cloned();
        }
        summary.find_by_point(point).cloned()
    }

    /// Match a caller's network address against package endpoint hosts.
    pub fn find_by_address(&self, address: &str) -> Option<Package> {
        self.summary.lock().find_by_address(address).cloned()
    }

    pub fn find_group(&self, name: &str) -> Option<Group> {
        self.summary.lock().find_group(name).cloned()
    }

    pub fn find_by_endpoint(&self, endpoint: &str) -> Option<Package> {
        self.summary.lock().find_by_endpoint(endpoint).cloned()
    }

    /// Register a package, or refresh it when its point is already known.
    pub fn save(&self, registration: Registration) -> Result<SaveOutcome, GatewayError> {
        if let Some(field) = registration.missing_field() {
            return Err(GatewayError::bad_request(format!("missing required field: {field}")));
        }
        self.mutate(|summary| Some(summary.upsert(registration, epoch_secs())))
            .map(|outcome| outcome.unwrap_or(SaveOutcome::Created))
    }

    /// Hard remove. A group left empty is removed with its last package.
    pub fn delete(&self, endpoint: &str) -> Result<Option<Package>, GatewayError> {
        self.mutate(|summary| {
            let at = summary.locate_endpoint(endpoint)?;
            summary.remove_at(at)
        })
    }

    /// Soft remove: mark the package Dead and keep it registered.
    pub fn unregister(&self, endpoint: &str) -> Result<Option<Package>, GatewayError> {
        self.mutate(|summary| {
            let at = summary.locate_endpoint(endpoint)?;
            let package = summary.package_mut(at)?;
            package.status = PackageStatus::Dead;
            Some(package.clone())
        })
    }

    /// Write a batch of probe outcomes and persist once.
    ///
    /// Endpoints that disappeared since the probes were dispatched are skipped.
    pub fn apply_health(&self, outcomes: &[(String, PackageStatus)]) -> Result<usize, GatewayError> {
        let mut current = self.summary.lock();
        let mut next = current.clone();
        let mut applied = 0;
        for (endpoint, status) in outcomes {
            let Some(at) = next.locate_endpoint(endpoint) else {
                continue;
            };
            if let Some(package) = next.package_mut(at) {
                package.status = *status;
                applied += 1;
            }
        }
        next.recount();
        self.persist(&next)?;
        *current = next;
        Ok(applied)
    }

    /// Apply `change` to a copy under the lock; persist and commit only when
    /// it reports a change.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Summary) -> Option<T>,
    ) -> Result<Option<T>, GatewayError> {
        let mut current = self.summary.lock();
        let mut next = current.clone();
        let Some(result) = change(&mut next) else {
            return Ok(None);
        };
        next.recount();
        self.persist(&next)?;
        *current = next;
        Ok(Some(result))
    }

    /// Blocking write of the full snapshot; see [`run_blocking`].
    fn persist(&self, summary: &Summary) -> Result<(), GatewayError> {
        self.store.save(summary).map_err(|e| {
            tracing::error!(err = %e, "failed to persist registry snapshot");
            GatewayError::internal(format!("failed to persist registry: {e}"))
        })
    }
}

/// Run `f` against `registry` on the blocking pool.
pub async fn run_blocking<T, F>(registry: &Arc<Registry>, f: F) -> Result<T, GatewayError>
where
    F: FnOnce(&Registry) -> T + Send + 'static,
    T: Send + 'static,
{
    let registry = Arc::clone(registry);
    tokio::task::spawn_blocking(move || f(&registry))
        .await
        .map_err(|e| GatewayError::internal(format!("registry task failed: {e}")))
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
