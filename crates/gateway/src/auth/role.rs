// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access levels and their acceptability order.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Access level carried by a user record or a token.
///
/// `Operator` dominates `Monitor`; `Unknown` sits outside the order and is
/// never authorized for anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum Role {
    Monitor,
    Operator,
    #[default]
    Unknown,
}

impl Role {
    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case("operator") {
            Self::Operator
        } else if text.eq_ignore_ascii_case("monitor") {
            Self::Monitor
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitor => "MONITOR",
            Self::Operator => "OPERATOR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether a holder of `self` may act where `required` is demanded.
    pub fn acceptable(self, required: Role) -> bool {
        match (self, required) {
            (Self::Unknown, _) | (_, Self::Unknown) => false,
            (Self::Operator, _) => true,
            (Self::Monitor, Self::Monitor) => true,
            (Self::Monitor, Self::Operator) => false,
        }
    }
}

impl From<String> for Role {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
