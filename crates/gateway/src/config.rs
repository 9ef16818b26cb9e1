// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::remote::DEFAULT_AUTHORITY_URL;
use crate::deploy::DEFAULT_ARTIFACT_EXTENSION;
use crate::token::TokenPolicy;
use crate::upstream::client::ClientTimeouts;

/// Credential backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthBackend {
    /// User records in `<state_dir>/users.json`.
    Local,
    /// Remote credential authority over gRPC.
    Remote,
}

/// Configuration for the fleetgate gateway.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "fleetgate", version, about = "Package registry and deploy gateway")]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "FLEETGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9190, env = "FLEETGATE_PORT")]
    pub port: u16,

    /// Directory holding registry.json, users.json and staged uploads.
    #[arg(long, env = "FLEETGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Credential backend.
    #[arg(long, value_enum, default_value = "local", env = "FLEETGATE_AUTH")]
    pub auth: AuthBackend,

    /// Remote credential authority URL (used with `--auth remote`).
    #[arg(long, default_value = DEFAULT_AUTHORITY_URL, env = "FLEETGATE_AUTHORITY_URL")]
    pub authority_url: String,

    /// Dial and call timeout for the credential authority, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "FLEETGATE_AUTHORITY_TIMEOUT_MS")]
    pub authority_timeout_ms: u64,

    /// Lifetime of standard tokens, in seconds.
    #[arg(long, default_value_t = 3600, env = "FLEETGATE_TOKEN_TTL_SECS")]
    pub token_ttl_secs: u64,

    /// Lifetime of single-shot CLI tokens, in seconds.
    #[arg(long, default_value_t = 10, env = "FLEETGATE_INSTANT_TOKEN_TTL_SECS")]
    pub instant_token_ttl_secs: u64,

    /// Expired-token sweep interval in milliseconds. Bounds how long an
    /// expired token is still honored.
    #[arg(long, default_value_t = 10_000, env = "FLEETGATE_TOKEN_SWEEP_MS")]
    pub token_sweep_ms: u64,

    /// Health probe timeout in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "FLEETGATE_PROBE_TIMEOUT_MS")]
    pub probe_timeout_ms: u64,

    /// Artifact upload timeout in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "FLEETGATE_DEPLOY_TIMEOUT_MS")]
    pub deploy_timeout_ms: u64,

    /// Process register/unregister call timeout in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "FLEETGATE_PROCESS_TIMEOUT_MS")]
    pub process_timeout_ms: u64,

    /// TCP connect timeout for package endpoints in milliseconds.
    #[arg(long, default_value_t = 2000, env = "FLEETGATE_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// Periodic health sweep interval in milliseconds (0 disables).
    #[arg(long, default_value_t = 0, env = "FLEETGATE_HEALTH_SWEEP_MS")]
    pub health_sweep_ms: u64,

    /// Required artifact file extension.
    #[arg(long, default_value = DEFAULT_ARTIFACT_EXTENSION, env = "FLEETGATE_ARTIFACT_EXTENSION")]
    pub artifact_extension: String,

    /// Maximum accepted artifact size in bytes.
    #[arg(long, default_value_t = 512 * 1024 * 1024, env = "FLEETGATE_MAX_ARTIFACT_BYTES")]
    pub max_artifact_bytes: usize,
}

impl GatewayConfig {
    /// Resolve the state directory.
    ///
    /// Uses `--state-dir` / `FLEETGATE_STATE_DIR`, then
    /// `$XDG_STATE_HOME/fleetgate`, then `$HOME/.local/state/fleetgate`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("fleetgate");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/fleetgate");
        }
        PathBuf::from(".fleetgate")
    }

    /// Where uploads are staged before broadcast.
    pub fn staging_dir(&self) -> PathBuf {
        self.state_dir().join("tmp")
    }

    pub fn authority_timeout(&self) -> Duration {
        Duration::from_millis(self.authority_timeout_ms)
    }

    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            standard_ttl: Duration::from_secs(self.token_ttl_secs),
            instant_ttl: Duration::from_secs(self.instant_token_ttl_secs),
            sweep_interval: Duration::from_millis(self.token_sweep_ms),
        }
    }

    pub fn client_timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            probe: Duration::from_millis(self.probe_timeout_ms),
            deploy: Duration::from_millis(self.deploy_timeout_ms),
            process: Duration::from_millis(self.process_timeout_ms),
        }
    }

    /// Periodic health sweep interval, if enabled.
    pub fn health_sweep_interval(&self) -> Option<Duration> {
        (self.health_sweep_ms > 0).then(|| Duration::from_millis(self.health_sweep_ms))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
