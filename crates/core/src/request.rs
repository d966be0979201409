// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The contract between workflow activities and the execution backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{directory_id, Command, JobId, WorkflowId};

/// Structured result of one connector execution.
pub type ResultMap = serde_json::Map<String, serde_json::Value>;

/// A named config file written into the execution directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub name: String,
    pub data: String,
}

impl ConfigFile {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self { name: name.into(), data: data.into() }
    }
}

/// One containerized connector execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub command: Command,
    /// Connector type; selects the image
    pub connector_type: String,
    /// Image tag
    pub version: String,
    /// Full connector argv (sub-command first)
    pub args: Vec<String>,
    pub configs: Vec<ConfigFile>,
    pub workflow_id: WorkflowId,
    pub job_id: Option<JobId>,
    pub timeout: Duration,
    /// File in the execution directory holding the structured result
    pub output_file: Option<String>,
}

impl ExecutionRequest {
    pub fn new(
        command: Command,
        connector_type: impl Into<String>,
        version: impl Into<String>,
        workflow_id: WorkflowId,
    ) -> Self {
        Self {
            command,
            connector_type: connector_type.into(),
            version: version.into(),
            args: vec![command.cli_name().to_string()],
            configs: Vec::new(),
            workflow_id,
            job_id: None,
            timeout: Duration::from_secs(300),
            output_file: None,
        }
    }

    crate::setters! {
        set {
            args: Vec<String>,
            configs: Vec<ConfigFile>,
            timeout: Duration,
        }
        option {
            job_id: JobId,
            output_file: String,
        }
    }

    /// Working-directory name for this execution on shared storage.
    pub fn directory_id(&self) -> String {
        directory_id(&self.workflow_id, self.command)
    }
}
