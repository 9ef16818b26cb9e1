// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for registry snapshots.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::registry::model::Summary;

/// File name of the registry snapshot inside the state directory.
pub const SNAPSHOT_FILE: &str = "registry.json";

/// Full-snapshot storage contract. No incremental diffs.
pub trait SnapshotStore: Send + Sync {
    /// Load the stored snapshot, or `None` when nothing was stored yet.
    fn load(&self) -> anyhow::Result<Option<Summary>>;

    fn save(&self, summary: &Summary) -> anyhow::Result<()>;
}

/// Snapshot stored as a JSON file, replaced atomically on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/registry.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SNAPSHOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> anyhow::Result<Option<Summary>> {
        crate::persist::load(&self.path)
    }

    fn save(&self, summary: &Summary) -> anyhow::Result<()> {
        crate::persist::save(&self.path, summary)?;
        tracing::debug!(path = %self.path.display(), "registry snapshot written");
        Ok(())
    }
}

/// In-process snapshot storage, for ephemeral gateways and tests.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Summary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(summary: Summary) -> Self {
        Self { slot: Mutex::new(Some(summary)) }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Option<Summary>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, summary: &Summary) -> anyhow::Result<()> {
        *self.slot.lock() = Some(summary.clone());
        Ok(())
    }
}
