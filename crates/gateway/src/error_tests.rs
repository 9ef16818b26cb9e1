// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    not_found = { ErrorCode::NotFound, StatusCode::NOT_FOUND, "NOT_FOUND" },
    unauthorized = { ErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, "UNAUTHORIZED" },
    bad_request = { ErrorCode::BadRequest, StatusCode::BAD_REQUEST, "BAD_REQUEST" },
    transport = { ErrorCode::Transport, StatusCode::BAD_GATEWAY, "TRANSPORT" },
    internal = { ErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL" },
)]
fn code_mapping(code: ErrorCode, status: StatusCode, text: &str) {
    assert_eq!(code.http_status(), status);
    assert_eq!(code.as_str(), text);
    assert_eq!(code.to_string(), text);
}

#[test]
fn http_response_carries_code_and_message() -> anyhow::Result<()> {
    let (status, Json(body)) = ErrorCode::NotFound.to_http_response("no such group");
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = serde_json::to_value(body)?;
    assert_eq!(body, serde_json::json!({ "error": { "code": "NOT_FOUND", "message": "no such group" } }));
    Ok(())
}

#[test]
fn gateway_error_display_includes_code() {
    let err = GatewayError::bad_request("invalid artifact name");
    assert_eq!(err.code, ErrorCode::BadRequest);
    assert_eq!(err.to_string(), "BAD_REQUEST: invalid artifact name");
}

#[test]
fn gateway_error_into_response_uses_status() {
    let resp = GatewayError::transport("endpoint unreachable").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}
