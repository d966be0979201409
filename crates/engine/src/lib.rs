// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olake-engine: workflows, schedules and the job service
//!
//! - [`runtime`]: the workflow engine seam and the in-process [`LocalEngine`]
//! - [`workflow`]: workflow types, timeouts and retry policy per command
//! - [`activity`]: the [`Worker`] that runs workflows on an execution backend
//! - [`schedule`]: the Schedule Manager, one cron schedule per job
//! - [`service`]: [`JobService`], the operations exposed to the CRUD layer
//! - [`jobs`]: the job data the orchestrator consumes

pub mod activity;
pub mod jobs;
pub mod runtime;
pub mod schedule;
pub mod service;
pub mod workflow;

pub use activity::{Worker, WorkerConfig};
pub use jobs::{JobDataService, JobStoreError, MemoryJobStore};
pub use runtime::{
    EngineError, ExecutionInfo, ListQuery, LocalEngine, RunHandle, ScheduleAction,
    ScheduleDescription, ScheduleSpec, ScheduleUpdate, StartOptions, WorkflowContext,
    WorkflowEngine, WorkflowRunner, WorkflowStatus, DEFAULT_RUN_RETENTION,
};
pub use schedule::{ScheduleError, ScheduleManager};
pub use service::{
    JobService, JobTask, ServiceConfig, ServiceError, DOCKER_TASK_QUEUE, K8S_TASK_QUEUE,
};
pub use workflow::{RetryPolicy, WorkflowError, WorkflowInput};
