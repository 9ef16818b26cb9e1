// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gRPC client for a remote credential authority.
//!
//! The channel is dialed lazily on first use. When a call fails at the
//! transport level the channel is dropped; the next call dials again.

use std::time::Duration;

use tokio::sync::Mutex;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use crate::auth::{AuthFailure, Role};

/// Default authority address.
pub const DEFAULT_AUTHORITY_URL: &str = "http://127.0.0.1:6413";

const AUTHENTICATE_PATH: &str = "/authority.v1.CredentialAuthority/Authenticate";

/// Wire messages of `authority.v1`.
pub mod proto {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AuthenticateRequest {
        #[prost(string, tag = "1")]
        pub id: String,
        #[prost(string, tag = "2")]
        pub password: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AuthenticateResponse {
        #[prost(oneof = "authenticate_response::Response", tags = "1, 2")]
        pub response: Option<authenticate_response::Response>,
    }

    pub mod authenticate_response {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Response {
            #[prost(string, tag = "1")]
            Role(String),
            #[prost(message, tag = "2")]
            Error(super::ResponseError),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ResponseError {
        #[prost(enumeration = "ErrorKind", tag = "1")]
        pub kind: i32,
        #[prost(string, tag = "2")]
        pub code: String,
        #[prost(string, tag = "3")]
        pub desc: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum ErrorKind {
        Unspecified = 0,
        Unauthorized = 1,
        BadParameter = 2,
        NotFound = 3,
        Other = 4,
    }
}

use proto::authenticate_response::Response;
use proto::{AuthenticateRequest, AuthenticateResponse, ErrorKind};

/// Lazily connected delegate to the remote authority.
pub struct RemoteAuthority {
    url: String,
    timeout: Duration,
    channel: Mutex<Option<Channel>>,
}

impl RemoteAuthority {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout, channel: Mutex::new(None) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Cached channel, dialing one when none is held.
    async fn channel(&self) -> Result<Channel, AuthFailure> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref() {
            return Ok(channel.clone());
        }
        let endpoint = Endpoint::from_shared(self.url.clone())
            .map_err(|e| AuthFailure::Transport(format!("invalid authority url: {e}")))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| AuthFailure::Transport(format!("connect {}: {e}", self.url)))?;
        tracing::info!(url = %self.url, "connected to credential authority");
        *slot = Some(channel.clone());
        Ok(channel)
    }

    async fn drop_channel(&self) {
        self.channel.lock().await.take();
    }

    pub async fn authenticate(&self, id: &str, password: &str) -> Result<Role, AuthFailure> {
        let channel = self.channel().await?;
        let request = AuthenticateRequest { id: id.to_owned(), password: password.to_owned() };
        let response = match call_authenticate(channel, request).await {
            Ok(response) => response,
            Err(e) => {
                self.drop_channel().await;
                tracing::warn!(url = %self.url, err = %e, "credential authority call failed");
                return Err(AuthFailure::Transport(e));
            }
        };

        match response.response {
            Some(Response::Role(role)) => Ok(Role::parse(&role)),
            Some(Response::Error(err)) => {
                let kind = ErrorKind::try_from(err.kind).unwrap_or(ErrorKind::Other);
                tracing::warn!(id, kind = ?kind, code = %err.code, desc = %err.desc, "authority rejected credentials");
                Err(AuthFailure::Rejected(kind))
            }
            None => Err(AuthFailure::Rejected(ErrorKind::Unspecified)),
        }
    }
}

async fn call_authenticate(
    channel: Channel,
    request: AuthenticateRequest,
) -> Result<AuthenticateResponse, String> {
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.map_err(|e| format!("authority not ready: {e}"))?;
    let codec = tonic_prost::ProstCodec::<AuthenticateRequest, AuthenticateResponse>::default();
    let path = PathAndQuery::from_static(AUTHENTICATE_PATH);
    let response = grpc
        .unary(tonic::Request::new(request), path, codec)
        .await
        .map_err(|status| format!("{}: {}", status.code(), status.message()))?;
    Ok(response.into_inner())
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
