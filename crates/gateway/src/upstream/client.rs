// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for reaching registered package endpoints.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;

/// User agent sent on every outbound call.
pub const USER_AGENT: &str = concat!("fleetgate/", env!("CARGO_PKG_VERSION"));

/// Per-call timeouts for package endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub probe: Duration,
    pub deploy: Duration,
    pub process: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            probe: Duration::from_secs(10),
            deploy: Duration::from_secs(60),
            process: Duration::from_secs(60),
        }
    }
}

/// Process command pushed to a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessCommand {
    pub process: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// Instruction part of a deploy upload.
#[derive(Debug, Serialize)]
struct DeployInstruction<'a> {
    when: &'a str,
    file: &'a str,
}

/// Shared HTTP client for health probes and artifact uploads.
#[derive(Clone)]
pub struct PackageClient {
    client: Client,
    timeouts: ClientTimeouts,
}

impl PackageClient {
    pub fn new(timeouts: ClientTimeouts) -> anyhow::Result<Self> {
        // reqwest is built without a bundled provider; install ring once.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, timeouts })
    }

    pub fn timeouts(&self) -> ClientTimeouts {
        self.timeouts
    }

    /// Zero-payload liveness probe: `POST <endpoint>/package/health/v1`.
    pub async fn probe(&self, endpoint: &str) -> anyhow::Result<()> {
        let url = build_rest_url(endpoint, "/package/health/v1");
        self.client.post(url).timeout(self.timeouts.probe).send().await?.error_for_status()?;
        Ok(())
    }

    /// Push an artifact: `POST <endpoint>/deploy/v1` as multipart with a
    /// `json` instruction part and an `artifact` part.
    pub async fn upload(
        &self,
        endpoint: &str,
        artifact: Bytes,
        file_name: &str,
        token: Option<&str>,
    ) -> anyhow::Result<()> {
        let instruction = serde_json::to_string(&DeployInstruction { when: "now", file: file_name })?;
        let form = Form::new()
            .part("json", Part::text(instruction).mime_str("application/json")?)
            .part(
                "artifact",
                Part::stream(artifact)
                    .file_name(file_name.to_owned())
                    .mime_str("application/octet-stream")?,
            );

        let url = build_rest_url(endpoint, "/deploy/v1");
        let mut req = self.client.post(url).timeout(self.timeouts.deploy).multipart(form);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await?.error_for_status()?;
        Ok(())
    }

    /// `POST <endpoint><path>` with a JSON process command.
    pub async fn send_process(
        &self,
        endpoint: &str,
        path: &str,
        command: &ProcessCommand,
        token: Option<&str>,
    ) -> anyhow::Result<()> {
        let url = build_rest_url(endpoint, path);
        let mut req = self.client.post(url).timeout(self.timeouts.process).json(command);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Join `endpoint` and `suffix` with exactly one `/` between them.
pub fn build_rest_url(endpoint: &str, suffix: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), suffix.trim_start_matches('/'))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
