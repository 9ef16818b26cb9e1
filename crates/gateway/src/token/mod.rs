// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability tokens: issuance with two lifetime classes, and validation.

pub mod store;

use std::sync::Arc;
use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::auth::Role;
use crate::error::GatewayError;
pub use crate::token::store::TokenStore;

/// Length of generated tokens, in alphanumeric characters.
pub const TOKEN_LEN: usize = 64;

/// Token lifetimes and sweep cadence.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    /// Lifetime of tokens handed to interactive and API callers.
    pub standard_ttl: Duration,
    /// Lifetime of single-shot CLI tokens.
    pub instant_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            standard_ttl: Duration::from_secs(3600),
            instant_ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

pub struct TokenService {
    store: Arc<TokenStore>,
    policy: TokenPolicy,
}

impl TokenService {
    pub fn new(policy: TokenPolicy, shutdown: &CancellationToken) -> Self {
        Self { store: TokenStore::new(policy.sweep_interval, shutdown), policy }
    }

    pub fn generate_token(&self, role: Role) -> String {
        self.issue(role, self.policy.standard_ttl)
    }

    pub fn generate_instant_token(&self, role: Role) -> String {
        self.issue(role, self.policy.instant_ttl)
    }

    fn issue(&self, role: Role, ttl: Duration) -> String {
        let token = random_token();
        self.store.put(token.clone(), role, ttl);
        tracing::debug!(role = %role, ttl_secs = ttl.as_secs(), "token issued");
        token
    }

    /// Check that `token` exists and carries a role acceptable for `required`.
    /// Returns the stored role.
    pub fn validate_token(&self, token: &str, required: Role) -> Result<Role, GatewayError> {
        if token.is_empty() {
            return Err(GatewayError::unauthorized("missing token"));
        }
        let Some(role) = self.store.get(token) else {
            return Err(GatewayError::unauthorized("unknown or expired token"));
        };
        if !role.acceptable(required) {
            return Err(GatewayError::unauthorized(format!(
                "role {role} is not sufficient, {required} required"
            )));
        }
        Ok(role)
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn shutdown(&self) {
        self.store.shutdown();
    }
}

fn random_token() -> String {
    rand::rng().sample_iter(&Alphanumeric).take(TOKEN_LEN).map(char::from).collect()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
