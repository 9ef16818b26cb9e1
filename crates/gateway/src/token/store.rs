// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory TTL store mapping opaque tokens to roles.
//!
//! Lookups never check expiry. Expired entries stay valid until the
//! background sweeper removes them, so the sweep interval bounds how long a
//! stale token can still be honored.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth::Role;

/// Shortest sweep period accepted; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

struct Entry {
    role: Role,
    expires_at: Instant,
}

/// Token → role map with periodic eviction of expired entries.
pub struct TokenStore {
    entries: RwLock<HashMap<String, Entry>>,
    cancel: CancellationToken,
}

impl TokenStore {
    /// Create the store and start its sweeper.
    ///
    /// The sweeper stops when `shutdown` is cancelled, when
    /// [`TokenStore::shutdown`] is called, or when the store is dropped.
    pub fn new(sweep_interval: Duration, shutdown: &CancellationToken) -> Arc<Self> {
        let store = Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            cancel: shutdown.child_token(),
        });
        spawn_sweeper(Arc::downgrade(&store), sweep_interval, store.cancel.clone());
        store
    }

    /// Insert or overwrite `token`.
    pub fn put(&self, token: impl Into<String>, role: Role, ttl: Duration) {
        let entry = Entry { role, expires_at: Instant::now() + ttl };
        self.entries.write().insert(token.into(), entry);
    }

    /// Role stored for `token`, expired or not.
    pub fn get(&self, token: &str) -> Option<Role> {
        self.entries.read().get(token).map(|e| e.role)
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background sweeper. Stored tokens remain readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TokenStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn spawn_sweeper(store: Weak<TokenStore>, interval: Duration, cancel: CancellationToken) {
    let period = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let Some(store) = store.upgrade() else {
                break;
            };
            let evicted = store.sweep();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = store.len(), "token sweep");
            }
        }
        tracing::debug!("token sweeper stopped");
    });
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
