// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway service object: owns every component and implements the
//! exposed operations.

use std::sync::Arc;

use chrono::FixedOffset;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::{Authenticator, LocalUsers, RemoteAuthority, Role};
use crate::broadcast::TallyReport;
use crate::config::{AuthBackend, GatewayConfig};
use crate::deploy::{resolve_endpoints, DeployCoordinator, DeployReport, DeployTarget, StagedArtifact};
use crate::error::GatewayError;
use crate::process::{self, validate_command, ProcessAction, ProcessReport};
use crate::registry::model::distinct_hosts;
use crate::registry::{
    run_blocking, Group, JsonFileStore, Package, Point, Registration, Registry, SaveOutcome,
};
use crate::report::GroupReport;
use crate::token::TokenService;
use crate::upstream::client::{PackageClient, ProcessCommand};
use crate::upstream::health::refresh_health;

/// Shortest accepted login id or password.
pub const MIN_CREDENTIAL_LEN: usize = 3;

/// Grouped registry report returned by [`Gateway::get_summary`].
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub group_count: usize,
    pub host_count: usize,
    pub package_count: usize,
    pub deployment: Vec<GroupReport>,
    /// Outcome of the health sweep run before the report was built.
    pub health: TallyReport,
}

/// Owned gateway state shared by every request.
pub struct Gateway {
    registry: Arc<Registry>,
    tokens: TokenService,
    authenticator: Authenticator,
    client: PackageClient,
    deployer: DeployCoordinator,
    shutdown: CancellationToken,
}

impl Gateway {
    pub fn new(
        registry: Arc<Registry>,
        tokens: TokenService,
        authenticator: Authenticator,
        deployer: DeployCoordinator,
        client: PackageClient,
        shutdown: CancellationToken,
    ) -> Self {
        Self { registry, tokens, authenticator, client, deployer, shutdown }
    }

    /// Build every component from `config`, rooted at its state directory.
    pub fn from_config(config: &GatewayConfig, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let state_dir = config.state_dir();
        std::fs::create_dir_all(&state_dir)?;

        let registry = Arc::new(Registry::open(JsonFileStore::in_dir(&state_dir))?);
        let tokens = TokenService::new(config.token_policy(), &shutdown);
        let authenticator = match config.auth {
            AuthBackend::Local => Authenticator::Local(LocalUsers::open(
                &state_dir.join(crate::auth::local::USERS_FILE),
            )?),
            AuthBackend::Remote => Authenticator::Remote(RemoteAuthority::new(
                config.authority_url.clone(),
                config.authority_timeout(),
            )),
        };
        let client = PackageClient::new(config.client_timeouts())?;
        let deployer = DeployCoordinator::new(
            client.clone(),
            config.artifact_extension.clone(),
            config.staging_dir(),
        );

        tracing::info!(
            state_dir = %state_dir.display(),
            auth = authenticator.kind(),
            "gateway initialized"
        );
        Ok(Self::new(registry, tokens, authenticator, deployer, client, shutdown))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn client(&self) -> &PackageClient {
        &self.client
    }

    pub fn deployer(&self) -> &DeployCoordinator {
        &self.deployer
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub async fn register_package(
        &self,
        registration: Registration,
    ) -> Result<SaveOutcome, GatewayError> {
        let point = Point::new(registration.host.clone(), registration.name.clone());
        let endpoint = registration.endpoint.clone();
        let outcome = run_blocking(&self.registry, move |r| r.save(registration)).await??;
        tracing::info!(point = %point, endpoint = %endpoint, ?outcome, "package registered");
        Ok(outcome)
    }

    /// Soft remove: the package stays listed as Dead.
    pub async fn unregister_package(&self, endpoint: &str) -> Result<Package, GatewayError> {
        let target = endpoint.to_owned();
        let package = run_blocking(&self.registry, move |r| r.unregister(&target))
            .await??
            .ok_or_else(|| GatewayError::not_found(format!("no package at {endpoint}")))?;
        tracing::info!(endpoint, point = %package.point(), "package unregistered");
        Ok(package)
    }

    /// Hard remove.
    pub async fn remove_package(&self, endpoint: &str) -> Result<Package, GatewayError> {
        let target = endpoint.to_owned();
        let package = run_blocking(&self.registry, move |r| r.delete(&target))
            .await??
            .ok_or_else(|| GatewayError::not_found(format!("no package at {endpoint}")))?;
        tracing::info!(endpoint, point = %package.point(), "package removed");
        Ok(package)
    }

    /// Endpoint for `point`, falling back to the caller's address when the
    /// point is absent or matches nothing.
    pub fn lookup_endpoint(
        &self,
        point: Option<&Point>,
        caller: &str,
    ) -> Result<String, GatewayError> {
        let by_point = point.filter(|p| !p.is_empty()).and_then(|p| self.registry.find_by_point(p));
        by_point
            .or_else(|| self.registry.find_by_address(caller))
            .map(|p| p.endpoint)
            .ok_or_else(|| GatewayError::not_found("no matching package"))
    }

    pub fn list_endpoints(&self, target: &DeployTarget) -> Result<Vec<String>, GatewayError> {
        resolve_endpoints(&self.registry, target)
    }

    pub async fn deploy_package(
        &self,
        artifact: StagedArtifact,
        target: &DeployTarget,
        token: Option<&str>,
    ) -> Result<DeployReport, GatewayError> {
        self.deployer.deploy(&self.registry, target, artifact, token).await
    }

    /// Ask every addressed package to register a process.
    pub async fn register_process(
        &self,
        command: ProcessCommand,
        target: &DeployTarget,
        token: Option<&str>,
    ) -> Result<ProcessReport, GatewayError> {
        self.process_command(ProcessAction::Register, command, target, token).await
    }

    /// Ask every addressed package to unregister a process.
    pub async fn unregister_process(
        &self,
        command: ProcessCommand,
        target: &DeployTarget,
        token: Option<&str>,
    ) -> Result<ProcessReport, GatewayError> {
        self.process_command(ProcessAction::Unregister, command, target, token).await
    }

    async fn process_command(
        &self,
        action: ProcessAction,
        command: ProcessCommand,
        target: &DeployTarget,
        token: Option<&str>,
    ) -> Result<ProcessReport, GatewayError> {
        validate_command(action, &command)?;
        let endpoints = resolve_endpoints(&self.registry, target)?;
        Ok(process::dispatch(&self.client, endpoints, action, command, token).await)
    }

    /// Re-probe every package, then report the registry, optionally
    /// narrowed to one group. Registration dates render at `zone`.
    pub async fn get_summary(
        &self,
        group: Option<&str>,
        zone: FixedOffset,
    ) -> Result<SummaryReport, GatewayError> {
        let health = refresh_health(&self.registry, &self.client).await?;
        let summary = self.registry.snapshot();

        let deployment: Vec<Group> = match group.map(str::trim).filter(|g| !g.is_empty()) {
            Some(name) => summary.find_group(name).cloned().into_iter().collect(),
            None => summary.groups,
        };
        let packages = deployment.iter().flat_map(|g| g.packages.iter());
        Ok(SummaryReport {
            group_count: deployment.len(),
            host_count: distinct_hosts(packages),
            package_count: deployment.iter().map(|g| g.packages.len()).sum(),
            deployment: deployment.into_iter().map(|g| GroupReport::render(g, zone)).collect(),
            health,
        })
    }

    /// Verify credentials and issue a token. `instant` selects the short
    /// single-shot lifetime.
    pub async fn authenticate(
        &self,
        id: &str,
        password: &str,
        instant: bool,
    ) -> Result<(String, Role), GatewayError> {
        if id.chars().count() < MIN_CREDENTIAL_LEN || password.chars().count() < MIN_CREDENTIAL_LEN {
            return Err(GatewayError::bad_request(format!(
                "id and password must be at least {MIN_CREDENTIAL_LEN} characters"
            )));
        }
        let role = self.authenticator.authenticate(id, password).await?;
        let token = if instant {
            self.tokens.generate_instant_token(role)
        } else {
            self.tokens.generate_token(role)
        };
        Ok((token, role))
    }

    pub fn validate_token(&self, token: &str, required: Role) -> Result<Role, GatewayError> {
        self.tokens.validate_token(token, required)
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
