// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON file persistence with atomic writes.

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a JSON document. Returns `Ok(None)` when the file does not exist.
pub fn load<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = serde_json::from_str(&contents)?;
    Ok(Some(value))
}

/// Replace `path` with `value` as pretty JSON. The document is written to a
/// sibling temp file and renamed over the target, so readers see either the
/// old or the new contents.
pub fn save<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut staged = tempfile::Builder::new().suffix(".tmp").tempfile_in(dir)?;
    serde_json::to_writer_pretty(&mut staged, value)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
