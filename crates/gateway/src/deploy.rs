// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact deployment: target resolution, staging, and broadcast upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::broadcast::{broadcast, Tally};
use crate::error::GatewayError;
use crate::registry::{Point, Registry};
use crate::upstream::client::PackageClient;

/// Artifact extension accepted when none is configured.
pub const DEFAULT_ARTIFACT_EXTENSION: &str = "far";

/// Which packages a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployTarget {
    /// Every package in the named group.
    Group(String),
    /// The one package at `host:name`.
    Point(Point),
    /// The package whose endpoint host matches the caller's address.
    Caller(String),
}

impl DeployTarget {
    /// Pick the target from request fields: a non-empty group wins over a
    /// non-empty package point, which wins over the caller address.
    pub fn from_request(group: Option<&str>, package: Option<&str>, caller: &str) -> Self {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }
        if let Some(group) = non_empty(group) {
            return Self::Group(group.to_owned());
        }
        if let Some(package) = non_empty(package) {
            return Self::Point(Point::parse(package));
        }
        Self::Caller(caller.to_owned())
    }
}

/// Endpoints addressed by `target`, in registry order. Empty is NotFound.
pub fn resolve_endpoints(
    registry: &Registry,
    target: &DeployTarget,
) -> Result<Vec<String>, GatewayError> {
    let endpoints = match target {
        DeployTarget::Group(name) => {
            registry.find_group(name).map(|g| g.endpoints()).unwrap_or_default()
        }
        DeployTarget::Point(point) => {
            registry.find_by_point(point).map(|p| vec![p.endpoint]).unwrap_or_default()
        }
        DeployTarget::Caller(address) => {
            registry.find_by_address(address).map(|p| vec![p.endpoint]).unwrap_or_default()
        }
    };
    if endpoints.is_empty() {
        let what = match target {
            DeployTarget::Group(name) => format!("group {name}"),
            DeployTarget::Point(point) => format!("package {point}"),
            DeployTarget::Caller(address) => format!("caller {address}"),
        };
        return Err(GatewayError::not_found(format!("no endpoint for {what}")));
    }
    Ok(endpoints)
}

/// An uploaded artifact held in a temp file.
///
/// The file is removed when the value is dropped, on every path.
#[derive(Debug)]
pub struct StagedArtifact {
    file: NamedTempFile,
    file_name: String,
    len: u64,
}

impl StagedArtifact {
    /// Create an empty staged file under `dir` for an upload named `file_name`.
    pub fn create(dir: &Path, file_name: impl Into<String>) -> Result<Self, GatewayError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            GatewayError::internal(format!("failed to create staging dir {}: {e}", dir.display()))
        })?;
        let file = tempfile::Builder::new()
            .prefix("artifact-")
            .tempfile_in(dir)
            .map_err(|e| GatewayError::internal(format!("failed to stage artifact: {e}")))?;
        Ok(Self { file, file_name: file_name.into(), len: 0 })
    }

    /// Stage `bytes` in one go.
    pub async fn from_bytes(
        dir: &Path,
        file_name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, GatewayError> {
        let mut staged = Self::create(dir, file_name)?;
        let mut writer = staged.writer()?;
        writer.write(bytes).await?;
        writer.finish().await?;
        Ok(staged)
    }

    /// Async writer appending to the staged file.
    pub fn writer(&mut self) -> Result<ArtifactWriter<'_>, GatewayError> {
        let handle = self
            .file
            .reopen()
            .map_err(|e| GatewayError::internal(format!("failed to open staged artifact: {e}")))?;
        Ok(ArtifactWriter { out: tokio::fs::File::from_std(handle), staged: self })
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Appends chunks to a [`StagedArtifact`], tracking its length.
pub struct ArtifactWriter<'a> {
    out: tokio::fs::File,
    staged: &'a mut StagedArtifact,
}

impl ArtifactWriter<'_> {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), GatewayError> {
        self.out
            .write_all(chunk)
            .await
            .map_err(|e| GatewayError::internal(format!("failed to write staged artifact: {e}")))?;
        self.staged.len += chunk.len() as u64;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.staged.len
    }

    pub async fn finish(mut self) -> Result<(), GatewayError> {
        self.out
            .flush()
            .await
            .map_err(|e| GatewayError::internal(format!("failed to flush staged artifact: {e}")))
    }
}

/// Strip directory components from `raw` and require the `.{extension}`
/// suffix (ASCII case-insensitive).
pub fn validate_file_name(raw: &str, extension: &str) -> Result<String, GatewayError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(GatewayError::bad_request(format!("invalid file name: {raw:?}")));
    }
    let matches = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if !matches {
        return Err(GatewayError::bad_request(format!(
            "invalid file name {name:?}: expected a .{extension} artifact"
        )));
    }
    Ok(name.to_owned())
}

/// Outcome of one deploy broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub file: String,
    pub bytes: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Pushes staged artifacts to resolved package endpoints.
pub struct DeployCoordinator {
    client: PackageClient,
    extension: String,
    staging_dir: PathBuf,
}

impl DeployCoordinator {
    pub fn new(client: PackageClient, extension: impl Into<String>, staging_dir: PathBuf) -> Self {
        Self { client, extension: extension.into(), staging_dir }
    }

    /// Directory uploads are staged under.
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Validate, resolve targets, upload to each concurrently and report.
    ///
    /// `artifact` is consumed; its temp file is gone when this returns.
    pub async fn deploy(
        &self,
        registry: &Registry,
        target: &DeployTarget,
        artifact: StagedArtifact,
        token: Option<&str>,
    ) -> Result<DeployReport, GatewayError> {
        let file = validate_file_name(artifact.file_name(), &self.extension)?;
        let endpoints = resolve_endpoints(registry, target)?;
        let payload = tokio::fs::read(artifact.path())
            .await
            .map(Bytes::from)
            .map_err(|e| GatewayError::internal(format!("failed to read staged artifact: {e}")))?;
        let bytes = artifact.len();
        drop(artifact);

        tracing::info!(file = %file, bytes, targets = endpoints.len(), "deploy dispatched");

        let tally = Tally::new();
        let token: Option<Arc<str>> = token.map(Arc::from);
        let units = endpoints.into_iter().map(|endpoint| {
            let client = self.client.clone();
            let tally = Arc::clone(&tally);
            let payload = payload.clone();
            let file = file.clone();
            let token = token.clone();
            async move {
                match client.upload(&endpoint, payload, &file, token.as_deref()).await {
                    Ok(()) => {
                        tracing::debug!(endpoint = %endpoint, "artifact delivered");
                        tally.record(true);
                    }
                    Err(e) => {
                        tracing::warn!(endpoint = %endpoint, err = %e, "artifact upload failed");
                        tally.record(false);
                    }
                }
            }
        });

        let report = broadcast(units, |total| tally.finish(total)).await;
        tracing::info!(
            file = %file,
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "deploy complete"
        );
        Ok(DeployReport {
            file,
            bytes,
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
        })
    }
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
