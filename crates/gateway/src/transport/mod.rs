// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the gateway.

pub mod auth;
pub mod http;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;

/// Headroom over the artifact limit for the multipart framing and json part.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// State shared by every handler.
pub struct ServerState {
    pub gateway: Arc<Gateway>,
    pub max_artifact_bytes: usize,
}

impl ServerState {
    pub fn new(gateway: Arc<Gateway>, max_artifact_bytes: usize) -> Arc<Self> {
        Arc::new(Self { gateway, max_artifact_bytes })
    }
}

/// Build the axum `Router` with all gateway routes.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let body_limit = state.max_artifact_bytes.saturating_add(MULTIPART_OVERHEAD);

    // Readers: any valid token.
    let monitor = Router::new()
        .route("/token/v1", post(http::token_probe))
        .route("/pack/v1", post(http::pack_summary))
        .route("/package/retrieve", post(http::retrieve_endpoint))
        .route("/package/endpoints", post(http::list_endpoints))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_monitor));

    // Deploy and process commands need an operator token.
    let operator = Router::new()
        .route("/deploy/v1", post(http::deploy).layer(DefaultBodyLimit::max(body_limit)))
        .route("/proc/register/v1", post(http::register_process))
        .route("/proc/unregister/v1", post(http::unregister_process))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_operator));

    Router::new()
        // Open: liveness, login, and package self-registration.
        .route("/health", get(http::health))
        .route("/auth/login", post(http::login))
        .route("/package/register", post(http::register_package))
        .route("/package/unregister", post(http::unregister_package))
        .route("/package/remove", post(http::remove_package))
        .merge(monitor)
        .merge(operator)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
