// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definitions: one workflow per connector command.
//!
//! Each workflow wraps exactly one activity with a retry policy and a
//! timeout. None of them retry: interactive commands fail fast back to the
//! caller, and repeating a partial sync without review risks duplicates.
//!
//! | command           | workflow                   | execution timeout |
//! |-------------------|----------------------------|-------------------|
//! | discover          | `DiscoverCatalogWorkflow`  | 10 minutes        |
//! | check             | `TestConnectionWorkflow`   | 5 minutes         |
//! | spec              | `FetchSpecWorkflow`        | 5 minutes         |
//! | sync              | `RunSyncWorkflow`          | 30 days           |
//! | clear-destination | `ClearDestinationWorkflow` | 30 days           |

use std::time::Duration;

use olake_adapters::ExecutionError;
use olake_core::{Command, ConnectorRef, ConnectorRole, JobId, ProjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DISCOVER_WORKFLOW: &str = "DiscoverCatalogWorkflow";
pub const CHECK_WORKFLOW: &str = "TestConnectionWorkflow";
pub const SPEC_WORKFLOW: &str = "FetchSpecWorkflow";
pub const SYNC_WORKFLOW: &str = "RunSyncWorkflow";
pub const CLEAR_DESTINATION_WORKFLOW: &str = "ClearDestinationWorkflow";

pub const DISCOVER_ACTIVITY: &str = "DiscoverCatalogActivity";
pub const CHECK_ACTIVITY: &str = "TestConnectionActivity";
pub const SPEC_ACTIVITY: &str = "FetchSpecActivity";
pub const SYNC_ACTIVITY: &str = "SyncActivity";
pub const CLEAR_DESTINATION_ACTIVITY: &str = "ClearDestinationActivity";

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Registered workflow type name for a command.
pub fn workflow_type(command: Command) -> &'static str {
    match command {
        Command::Discover => DISCOVER_WORKFLOW,
        Command::Check => CHECK_WORKFLOW,
        Command::Spec => SPEC_WORKFLOW,
        Command::Sync => SYNC_WORKFLOW,
        Command::ClearDestination => CLEAR_DESTINATION_WORKFLOW,
    }
}

/// Registered activity name for a command.
pub fn activity_name(command: Command) -> &'static str {
    match command {
        Command::Discover => DISCOVER_ACTIVITY,
        Command::Check => CHECK_ACTIVITY,
        Command::Spec => SPEC_ACTIVITY,
        Command::Sync => SYNC_ACTIVITY,
        Command::ClearDestination => CLEAR_DESTINATION_ACTIVITY,
    }
}

/// Whole-run limit for a command's workflow.
pub fn execution_timeout(command: Command) -> Duration {
    match command {
        Command::Discover => 10 * MINUTE,
        Command::Check | Command::Spec => 5 * MINUTE,
        Command::Sync | Command::ClearDestination => 30 * DAY,
    }
}

/// Activity retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    /// Total attempts including the first; 0 means unlimited
    pub maximum_attempts: u32,
}

impl RetryPolicy {
    /// Short backoff, single attempt.
    pub fn no_retry() -> Self {
        Self {
            initial_interval: Duration::from_secs(5),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(5 * 60),
            maximum_attempts: 1,
        }
    }

    /// Whether attempt number `attempt` (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.maximum_attempts == 0 || attempt <= self.maximum_attempts
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.maximum_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Per-activity options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityOptions {
    /// Passed to the backend as the execution timeout
    pub start_to_close: Duration,
    pub retry: RetryPolicy,
}

pub fn activity_options(command: Command) -> ActivityOptions {
    ActivityOptions { start_to_close: execution_timeout(command), retry: RetryPolicy::no_retry() }
}

/// Input of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum WorkflowInput {
    Discover {
        connector: ConnectorRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        /// Existing streams config to merge the discovered catalog into
        #[serde(default, skip_serializing_if = "Option::is_none")]
        streams_config: Option<String>,
    },
    Check {
        connector: ConnectorRef,
        role: ConnectorRole,
    },
    Spec {
        connector_type: String,
        version: String,
        role: ConnectorRole,
    },
    Sync {
        project_id: ProjectId,
        job_id: JobId,
    },
    ClearDestination {
        project_id: ProjectId,
        job_id: JobId,
        /// Streams whose destination data is cleared
        streams_config: String,
    },
}

impl WorkflowInput {
    pub fn command(&self) -> Command {
        match self {
            WorkflowInput::Discover { .. } => Command::Discover,
            WorkflowInput::Check { .. } => Command::Check,
            WorkflowInput::Spec { .. } => Command::Spec,
            WorkflowInput::Sync { .. } => Command::Sync,
            WorkflowInput::ClearDestination { .. } => Command::ClearDestination,
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        match self {
            WorkflowInput::Discover { job_id, .. } => *job_id,
            WorkflowInput::Sync { job_id, .. } | WorkflowInput::ClearDestination { job_id, .. } => {
                Some(*job_id)
            }
            WorkflowInput::Check { .. } | WorkflowInput::Spec { .. } => None,
        }
    }
}

/// Why a workflow run did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("execution timed out: {0}")]
    Timeout(String),
    #[error("workflow canceled")]
    Canceled,
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("job data: {0}")]
    JobData(String),
    #[error("{connector} {version} does not support {command} (requires {minimum})")]
    UnsupportedVersion { connector: String, version: String, command: Command, minimum: String },
}

impl From<ExecutionError> for WorkflowError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::Canceled => WorkflowError::Canceled,
            ExecutionError::Timeout(_) => WorkflowError::Timeout(e.to_string()),
            other => WorkflowError::Execution(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
