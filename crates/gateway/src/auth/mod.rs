// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential verification: local user records or a remote authority.

pub mod local;
pub mod remote;
pub mod role;

use std::fmt;

use crate::error::GatewayError;
pub use crate::auth::local::LocalUsers;
pub use crate::auth::remote::RemoteAuthority;
pub use crate::auth::role::Role;

/// Why a credential check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// No user with that id.
    NotFound,
    /// Password does not match.
    Mismatch,
    /// The remote authority answered with an error.
    Rejected(remote::proto::ErrorKind),
    /// The remote authority could not be reached.
    Transport(String),
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("user not found"),
            Self::Mismatch => f.write_str("password mismatch"),
            Self::Rejected(kind) => write!(f, "rejected by authority ({kind:?})"),
            Self::Transport(e) => write!(f, "authority unreachable: {e}"),
        }
    }
}

impl From<AuthFailure> for GatewayError {
    /// Every credential rejection maps to the same generic Unauthorized.
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Transport(e) => GatewayError::transport(format!("authority unreachable: {e}")),
            _ => GatewayError::unauthorized("authentication failed"),
        }
    }
}

/// Credential verifier, selected once at startup.
pub enum Authenticator {
    Local(LocalUsers),
    Remote(RemoteAuthority),
}

impl Authenticator {
    pub async fn authenticate(&self, id: &str, password: &str) -> Result<Role, AuthFailure> {
        let result = match self {
            Self::Local(users) => users.authenticate(id, password),
            Self::Remote(remote) => remote.authenticate(id, password).await,
        };
        match &result {
            Ok(role) => tracing::info!(id, role = %role, "user authenticated"),
            Err(e) => tracing::warn!(id, err = %e, "authentication failed"),
        }
        result
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
