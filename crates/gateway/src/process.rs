// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process register/unregister commands broadcast to packages.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::broadcast::{broadcast, Tally};
use crate::error::GatewayError;
use crate::upstream::client::{PackageClient, ProcessCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    Register,
    Unregister,
}

impl ProcessAction {
    /// Package-side route for this action.
    pub fn package_path(self) -> &'static str {
        match self {
            Self::Register => "/process/regist/v1",
            Self::Unregister => "/process/unregist/v1",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
        }
    }
}

impl fmt::Display for ProcessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one process command broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub action: ProcessAction,
    pub process: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Reject commands a package could not act on. Registration needs a group id.
pub fn validate_command(action: ProcessAction, command: &ProcessCommand) -> Result<(), GatewayError> {
    if command.process.trim().is_empty() {
        return Err(GatewayError::bad_request("missing required field: process"));
    }
    let has_group_id = command.group_id.as_deref().is_some_and(|g| !g.trim().is_empty());
    if action == ProcessAction::Register && !has_group_id {
        return Err(GatewayError::bad_request("missing required field: group_id"));
    }
    Ok(())
}

/// Send `command` to every endpoint concurrently and tally the answers.
pub async fn dispatch(
    client: &PackageClient,
    endpoints: Vec<String>,
    action: ProcessAction,
    command: ProcessCommand,
    token: Option<&str>,
) -> ProcessReport {
    let tally = Tally::new();
    let command = Arc::new(command);
    let token: Option<Arc<str>> = token.map(Arc::from);
    let units = endpoints.into_iter().map(|endpoint| {
        let client = client.clone();
        let tally = Arc::clone(&tally);
        let command = Arc::clone(&command);
        let token = token.clone();
        async move {
            let sent = client
                .send_process(&endpoint, action.package_path(), &command, token.as_deref())
                .await;
            if let Err(e) = &sent {
                tracing::warn!(endpoint = %endpoint, %action, err = %e, "process command failed");
            }
            tally.record(sent.is_ok());
        }
    });

    let report = broadcast(units, |total| tally.finish(total)).await;
    tracing::info!(
        %action,
        process = %command.process,
        total = report.total,
        succeeded = report.succeeded,
        "process command broadcast"
    );
    ProcessReport {
        action,
        process: command.process.clone(),
        total: report.total,
        succeeded: report.succeeded,
        failed: report.failed,
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
