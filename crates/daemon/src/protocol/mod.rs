// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC Protocol between the CRUD layer and the worker.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

mod wire;

pub use wire::{
    call, decode, encode, read_message, read_request, write_message, write_response,
    ProtocolError, MAX_MESSAGE_SIZE,
};

use olake_core::{ConnectorRef, ConnectorRole, JobData, JobId, ProjectId, ResultMap, ScheduleId};
use olake_engine::{JobTask, RunHandle};
use serde::{Deserialize, Serialize};

/// Request from the CRUD layer to the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Stop the worker
    Shutdown,

    /// Store a job and install its schedule
    CreateJob { job: JobData },

    UpdateJob { job: JobData },

    DeleteJob { project_id: ProjectId, job_id: JobId },

    /// Run the job's sync now
    SyncJob { project_id: ProjectId, job_id: JobId },

    CancelJobRun { project_id: ProjectId, job_id: JobId },

    ActivateJob { project_id: ProjectId, job_id: JobId, active: bool },

    ClearDestination { project_id: ProjectId, job_id: JobId, streams_config: String },

    StreamDifference { old_streams: String, new_streams: String },

    JobTasks { project_id: ProjectId, job_id: JobId },

    Discover {
        project_id: ProjectId,
        connector: ConnectorRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        streams_config: Option<String>,
    },

    TestConnection { project_id: ProjectId, connector: ConnectorRef, role: ConnectorRole },

    FetchSpec { connector_type: String, version: String, role: ConnectorRole },

    /// Replace the job→node mapping with `mapping` (same JSON as
    /// `OLAKE_K8S_JOB_MAPPING`)
    ReloadJobMapping { mapping: String },
}

/// Response from the worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Ok,

    Pong { version: String },

    ShuttingDown,

    ScheduleCreated { schedule_id: ScheduleId },

    /// Number of runs canceled
    Canceled { count: usize },

    /// A started run; `None` when a previous run was still going
    Run { run: Option<RunHandle> },

    StreamDifference { streams: String },

    JobTasks { tasks: Vec<JobTask> },

    /// Structured connector output
    Output { result: ResultMap },

    /// Outcome of a mapping reload; `used_fallback` means the last
    /// known-good mapping stayed in effect
    MappingLoaded { valid: usize, invalid: usize, used_fallback: bool, errors: Vec<String> },

    Error { message: String },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
