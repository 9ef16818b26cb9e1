// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role-gating middleware.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::Role;
use crate::transport::ServerState;

/// Bearer token from the `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Admit requests carrying a token acceptable for Monitor.
pub async fn require_monitor(
    state: State<Arc<ServerState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    authorize(&state, req, next, Role::Monitor).await
}

/// Admit requests carrying a token acceptable for Operator.
pub async fn require_operator(
    state: State<Arc<ServerState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    authorize(&state, req, next, Role::Operator).await
}

async fn authorize(
    state: &ServerState,
    req: Request<axum::body::Body>,
    next: Next,
    required: Role,
) -> Response {
    let token = bearer_token(req.headers()).unwrap_or_default();
    if let Err(e) = state.gateway.validate_token(token, required) {
        tracing::warn!(path = %req.uri().path(), required = %required, err = %e, "request denied");
        return e.into_response();
    }
    next.run(req).await
}
