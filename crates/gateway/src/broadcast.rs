// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent fan-out with a wait-for-all join.
//!
//! Every unit runs as its own task. Units record their own outcome into a
//! caller-supplied sink (usually a [`Tally`]); the dispatcher only counts
//! completions. Completion is signalled from a drop guard, so a unit that
//! panics or is aborted still releases the join.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;

/// Counting join primitive: reaches zero once every unit has finished.
struct Latch {
    remaining: AtomicUsize,
    done: Notify,
}

impl Latch {
    fn new(count: usize) -> Self {
        Self { remaining: AtomicUsize::new(count), done: Notify::new() }
    }

    fn count_down(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            // notify_one stores a permit, so a joiner arriving late still wakes.
            self.done.notify_one();
        }
    }

    async fn wait(&self) {
        while self.remaining.load(Ordering::Acquire) > 0 {
            self.done.notified().await;
        }
    }
}

/// Held by a running unit; counts the latch down when dropped.
struct Completion(Arc<Latch>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

/// Dispatch every unit concurrently and block until all of them complete,
/// then run `on_complete` with the number of units dispatched.
///
/// With no units this returns at once, still running `on_complete(0)`.
pub async fn broadcast<I, F, C, R>(units: I, on_complete: C) -> R
where
    I: IntoIterator<Item = F>,
    F: Future<Output = ()> + Send + 'static,
    C: FnOnce(usize) -> R,
{
    let units: Vec<F> = units.into_iter().collect();
    let total = units.len();
    if total == 0 {
        return on_complete(0);
    }

    let latch = Arc::new(Latch::new(total));
    for unit in units {
        let completion = Completion(Arc::clone(&latch));
        tokio::spawn(async move {
            let _completion = completion;
            unit.await;
        });
    }

    latch.wait().await;
    tracing::debug!(total, "broadcast joined");
    on_complete(total)
}

/// Shared success/failure counters for one broadcast round.
#[derive(Debug, Default)]
pub struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, ok: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Freeze the counters against the number of dispatched units.
    pub fn finish(&self, total: usize) -> TallyReport {
        TallyReport { total, succeeded: self.succeeded(), failed: self.failed() }
    }
}

/// Outcome counts of a finished broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TallyReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
