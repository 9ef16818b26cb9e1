// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the gateway.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, Multipart, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::deploy::{DeployReport, DeployTarget, StagedArtifact};
use crate::error::GatewayError;
use crate::gateway::SummaryReport;
use crate::process::ProcessReport;
use crate::registry::{Package, PackageStatus, Point, Registration, SaveOutcome};
use crate::report::{parse_zone, TIMEZONE_HEADER};
use crate::transport::auth::bearer_token;
use crate::transport::ServerState;
use crate::upstream::client::ProcessCommand;

/// User agent of the companion CLI; it receives single-shot tokens.
pub const CLI_USER_AGENT: &str = "fleetgate-cli";

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub package_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackRequest {
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PackResponse {
    pub summary: SummaryReport,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrieveRequest {
    /// `host:name`; absent means "whatever the caller is".
    #[serde(default)]
    pub point: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TargetRequest {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EndpointsResponse {
    pub endpoints: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub outcome: SaveOutcome,
}

#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct UnregisterResponse {
    pub endpoint: String,
    pub status: PackageStatus,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub removed: bool,
    pub package: Package,
}

/// `json` part of a deploy upload.
#[derive(Debug, Default, Deserialize)]
pub struct DeployInstruction {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Body of `/proc/register/v1` and `/proc/unregister/v1`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

impl ProcessRequest {
    fn split(self, caller: &str) -> (ProcessCommand, DeployTarget) {
        let target =
            DeployTarget::from_request(self.group.as_deref(), self.package.as_deref(), caller);
        (ProcessCommand { process: self.process, group_id: self.group_id }, target)
    }
}

// -- Extractors ---------------------------------------------------------------

/// Network address of the caller, empty when the server runs without
/// connection info.
#[derive(Debug, Clone, Default)]
pub struct CallerAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();
        Ok(Self(addr))
    }
}

/// Decode a JSON body, mapping malformed input to BadRequest. An empty body
/// decodes as `T::default()`.
fn decode_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    decode_required(body)
}

fn decode_required<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::bad_request(format!("invalid body: {e}")))
}

// -- Handlers -----------------------------------------------------------------

/// `GET /health`
pub async fn health(State(s): State<Arc<ServerState>>) -> impl IntoResponse {
    let package_count = s.gateway.registry().snapshot().package_count;
    Json(HealthResponse { status: "running".to_owned(), package_count })
}

/// `POST /auth/login`: exchange credentials for a token.
pub async fn login(
    State(s): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LoginResponse>, GatewayError> {
    let req: LoginRequest = decode_required(&body)?;
    let instant = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| ua.eq_ignore_ascii_case(CLI_USER_AGENT));
    let (token, role) = s.gateway.authenticate(&req.id, &req.password, instant).await?;
    Ok(Json(LoginResponse { token, role }))
}

/// `POST /token/v1`: report the role behind the presented token.
pub async fn token_probe(
    State(s): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, GatewayError> {
    let token = bearer_token(&headers).unwrap_or_default();
    let role = s.gateway.validate_token(token, Role::Monitor)?;
    Ok(Json(TokenResponse { valid: true, role }))
}

/// `POST /pack/v1`: registry report with freshly probed health. Dates
/// render in the zone named by [`TIMEZONE_HEADER`].
pub async fn pack_summary(
    State(s): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PackResponse>, GatewayError> {
    let req: PackRequest = decode_json(&body)?;
    let zone = parse_zone(headers.get(TIMEZONE_HEADER).and_then(|v| v.to_str().ok()));
    let summary = s.gateway.get_summary(req.group.as_deref(), zone).await?;
    Ok(Json(PackResponse { summary }))
}

/// `POST /package/retrieve`: endpoint for a point, or for the caller.
pub async fn retrieve_endpoint(
    State(s): State<Arc<ServerState>>,
    CallerAddr(caller): CallerAddr,
    body: Bytes,
) -> Result<Json<RetrieveResponse>, GatewayError> {
    let req: RetrieveRequest = decode_json(&body)?;
    let point = req.point.as_deref().map(Point::parse);
    let endpoint = s.gateway.lookup_endpoint(point.as_ref(), &caller)?;
    Ok(Json(RetrieveResponse { endpoint }))
}

/// `POST /package/endpoints`: endpoints addressed by a group, a point, or
/// the caller.
pub async fn list_endpoints(
    State(s): State<Arc<ServerState>>,
    CallerAddr(caller): CallerAddr,
    body: Bytes,
) -> Result<Json<EndpointsResponse>, GatewayError> {
    let req: TargetRequest = decode_json(&body)?;
    let target = DeployTarget::from_request(req.group.as_deref(), req.package.as_deref(), &caller);
    let endpoints = s.gateway.list_endpoints(&target)?;
    Ok(Json(EndpointsResponse { endpoints }))
}

/// `POST /package/register`
pub async fn register_package(
    State(s): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, GatewayError> {
    let registration: Registration = decode_required(&body)?;
    let outcome = s.gateway.register_package(registration).await?;
    Ok(Json(RegisterResponse { outcome }))
}

/// `POST /package/unregister`: mark a package Dead.
pub async fn unregister_package(
    State(s): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<UnregisterResponse>, GatewayError> {
    let req: EndpointRequest = decode_required(&body)?;
    let package = s.gateway.unregister_package(&req.endpoint).await?;
    Ok(Json(UnregisterResponse { endpoint: package.endpoint, status: package.status }))
}

/// `POST /package/remove`: drop a package from the registry.
pub async fn remove_package(
    State(s): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<Json<RemoveResponse>, GatewayError> {
    let req: EndpointRequest = decode_required(&body)?;
    let package = s.gateway.remove_package(&req.endpoint).await?;
    Ok(Json(RemoveResponse { removed: true, package }))
}

/// `POST /deploy/v1`: multipart upload (`json` instruction + `artifact`),
/// broadcast to the resolved packages.
pub async fn deploy(
    State(s): State<Arc<ServerState>>,
    CallerAddr(caller): CallerAddr,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DeployReport>, GatewayError> {
    let staging_dir = s.gateway.deployer().staging_dir().to_path_buf();
    let mut instruction = DeployInstruction::default();
    let mut artifact: Option<StagedArtifact> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("json") => {
                let raw = field.bytes().await.map_err(malformed)?;
                instruction = decode_required(&raw)?;
            }
            Some("artifact") => {
                let uploaded_name = field.file_name().unwrap_or_default().to_owned();
                let mut staged = StagedArtifact::create(&staging_dir, uploaded_name)?;
                let mut writer = staged.writer()?;
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    if writer.written() + chunk.len() as u64 > s.max_artifact_bytes as u64 {
                        return Err(GatewayError::bad_request(format!(
                            "artifact exceeds {} bytes",
                            s.max_artifact_bytes
                        )));
                    }
                    writer.write(&chunk).await?;
                }
                writer.finish().await?;
                artifact = Some(staged);
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    let Some(mut artifact) = artifact else {
        return Err(GatewayError::bad_request("missing artifact part"));
    };
    if let Some(file) = instruction.file.as_deref().filter(|f| !f.trim().is_empty()) {
        artifact.set_file_name(file);
    }

    let target = DeployTarget::from_request(
        instruction.group.as_deref(),
        instruction.package.as_deref(),
        &caller,
    );
    let report = s.gateway.deploy_package(artifact, &target, bearer_token(&headers)).await?;
    Ok(Json(report))
}

/// `POST /proc/register/v1`: broadcast a process registration.
pub async fn register_process(
    State(s): State<Arc<ServerState>>,
    CallerAddr(caller): CallerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessReport>, GatewayError> {
    let (command, target) = decode_json::<ProcessRequest>(&body)?.split(&caller);
    let report = s.gateway.register_process(command, &target, bearer_token(&headers)).await?;
    Ok(Json(report))
}

/// `POST /proc/unregister/v1`: broadcast a process unregistration.
pub async fn unregister_process(
    State(s): State<Arc<ServerState>>,
    CallerAddr(caller): CallerAddr,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessReport>, GatewayError> {
    let (command, target) = decode_json::<ProcessRequest>(&body)?.split(&caller);
    let report = s.gateway.unregister_process(command, &target, bearer_token(&headers)).await?;
    Ok(Json(report))
}

fn malformed(e: axum::extract::multipart::MultipartError) -> GatewayError {
    GatewayError::bad_request(format!("malformed multipart body: {e}"))
}
