// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Failure classes of gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Lookup matched nothing.
    NotFound,
    /// Bad credentials, or a token missing or too weak for the route.
    Unauthorized,
    BadRequest,
    /// A package endpoint was unreachable or answered with an error.
    Transport,
    /// Serialization or persistence failure.
    Internal,
}

impl ErrorCode {
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Transport => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Transport => "TRANSPORT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Status plus `{"error": {"code", "message"}}` body.
    pub fn to_http_response(self, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
        let body = ErrorResponse { error: ErrorBody { code: self, message: message.into() } };
        (self.http_status(), Json(body))
    }

    /// Attach a human-readable message to this code.
    pub fn with(self, message: impl Into<String>) -> GatewayError {
        GatewayError { code: self, message: message.into() }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a gateway operation: a machine-readable code plus context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
}

impl GatewayError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ErrorCode::NotFound.with(message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ErrorCode::Unauthorized.with(message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorCode::BadRequest.with(message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ErrorCode::Transport.with(message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ErrorCode::Internal.with(message)
    }

}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.code.to_http_response(self.message).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
