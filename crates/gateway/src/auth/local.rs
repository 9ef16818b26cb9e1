// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local user records backed by `users.json`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::{AuthFailure, Role};

/// File name of the user records inside the state directory.
pub const USERS_FILE: &str = "users.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub passwd: String,
    pub role: Role,
}

/// On-disk layout of `users.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserFile {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

impl UserFile {
    /// Contents written when no user file exists yet.
    pub fn bootstrap() -> Self {
        Self {
            users: vec![UserRecord {
                id: "admin".to_owned(),
                passwd: "admin".to_owned(),
                role: Role::Operator,
            }],
        }
    }
}

/// Read-only user lookup keyed by id.
#[derive(Debug)]
pub struct LocalUsers {
    users: HashMap<String, UserRecord>,
}

impl LocalUsers {
    pub fn new(records: Vec<UserRecord>) -> Self {
        let users = records.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self { users }
    }

    /// Load `path`, creating it with the bootstrap admin record when missing.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = match crate::persist::load::<UserFile>(path)? {
            Some(file) => file,
            None => {
                let file = UserFile::bootstrap();
                crate::persist::save(path, &file)?;
                tracing::info!(path = %path.display(), "created default user file");
                file
            }
        };
        tracing::debug!(users = file.users.len(), "local users loaded");
        Ok(Self::new(file.users))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn authenticate(&self, id: &str, password: &str) -> Result<Role, AuthFailure> {
        let user = self.users.get(id).ok_or(AuthFailure::NotFound)?;
        let stored = hash_password(&user.passwd);
        let supplied = hash_password(password);
        if !constant_time_eq(stored.as_bytes(), supplied.as_bytes()) {
            return Err(AuthFailure::Mismatch);
        }
        Ok(user.role)
    }
}

/// Lower-hex SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
