// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow engine seam.
//!
//! [`WorkflowEngine`] is the slice of a durable workflow engine the
//! orchestrator relies on: starting, waiting on and canceling workflow runs,
//! listing runs by id range and search attributes, and cron schedules with
//! overlap policy "skip". [`LocalEngine`] implements it in process.

mod local;

pub use local::{LocalEngine, DEFAULT_RUN_RETENTION};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use olake_core::{Command, FrequencyError, ResultMap, ScheduleId, WorkflowId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::workflow::{WorkflowError, WorkflowInput};

/// Errors from the workflow engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("workflow already running: {0}")]
    AlreadyRunning(WorkflowId),
    #[error("schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),
    #[error("schedule already exists: {0}")]
    ScheduleExists(ScheduleId),
    #[error("no worker registered for task queue {0}")]
    NoWorker(String),
    #[error(transparent)]
    InvalidCron(#[from] FrequencyError),
    #[error("workflow {workflow_id} {status}: {message}")]
    WorkflowFailed { workflow_id: WorkflowId, status: WorkflowStatus, message: String },
    #[error("timed out waiting for workflow {0}")]
    WaitTimeout(WorkflowId),
    #[error("schedule {schedule_id} runs {actual}, not {expected}")]
    ActionMismatch { schedule_id: ScheduleId, expected: Command, actual: Command },
}

/// Lifecycle of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Canceled,
    TimedOut,
}

olake_core::simple_display! {
    WorkflowStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Canceled => "canceled",
        TimedOut => "timed_out",
    }
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

/// Options for starting a workflow run.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub workflow_id: WorkflowId,
    pub task_queue: String,
    /// Hard limit on the whole run; the run is canceled and marked
    /// `TimedOut` when it elapses
    pub execution_timeout: Duration,
}

/// Identity of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    pub workflow_id: WorkflowId,
    pub run_id: String,
}

/// Queryable view of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub workflow_id: WorkflowId,
    pub run_id: String,
    pub workflow_type: String,
    /// `OperationType` search attribute
    pub operation: Command,
    pub status: WorkflowStatus,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionInfo {
    pub fn handle(&self) -> RunHandle {
        RunHandle { workflow_id: self.workflow_id.clone(), run_id: self.run_id.clone() }
    }
}

/// Filter for [`WorkflowEngine::list_workflows`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Half-open workflow id range `[lo, hi)`
    pub id_range: Option<(String, String)>,
    pub status: Option<WorkflowStatus>,
    pub operation: Option<Command>,
}

impl ListQuery {
    pub fn matches(&self, info: &ExecutionInfo) -> bool {
        if let Some((lo, hi)) = &self.id_range {
            let id = info.workflow_id.as_str();
            if id < lo.as_str() || id >= hi.as_str() {
                return false;
            }
        }
        filter_matches(&self.status, &info.status) && filter_matches(&self.operation, &info.operation)
    }
}

fn filter_matches<T: PartialEq>(filter: &Option<T>, value: &T) -> bool {
    filter.as_ref().map_or(true, |f| f == value)
}

/// The workflow a schedule starts on each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleAction {
    /// Base workflow id; each run appends its fire time
    pub workflow_id: WorkflowId,
    pub task_queue: String,
    pub execution_timeout: Duration,
    pub input: WorkflowInput,
}

impl ScheduleAction {
    pub fn operation(&self) -> Command {
        self.input.command()
    }
}

/// A cron schedule bound to one workflow action.
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    pub schedule_id: ScheduleId,
    /// Five-field cron expression
    pub cron: String,
    pub action: ScheduleAction,
    pub paused: bool,
}

/// Partial schedule update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub cron: Option<String>,
    pub action: Option<ScheduleAction>,
}

/// Current state of a schedule.
#[derive(Debug, Clone)]
pub struct ScheduleDescription {
    pub schedule_id: ScheduleId,
    pub cron: String,
    pub action: ScheduleAction,
    pub paused: bool,
    pub note: Option<String>,
    pub next_fire: Option<DateTime<Utc>>,
    /// Most recent runs started by this schedule, oldest first
    pub recent_runs: Vec<RunHandle>,
}

/// Per-run context handed to the workflow implementation.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub workflow_id: WorkflowId,
    pub run_id: String,
    /// Fires on workflow cancellation and on execution timeout
    pub cancel: CancellationToken,
}

/// Workflow implementations registered on a task queue.
#[async_trait]
pub trait WorkflowRunner: Send + Sync + 'static {
    async fn run(&self, ctx: WorkflowContext, input: WorkflowInput) -> Result<ResultMap, WorkflowError>;
}

/// Durable-execution operations used by the orchestrator.
#[async_trait]
pub trait WorkflowEngine: Send + Sync + 'static {
    /// Route workflows started on `task_queue` to `runner`.
    fn register_worker(&self, task_queue: &str, runner: Arc<dyn WorkflowRunner>);

    async fn start_workflow(
        &self,
        options: StartOptions,
        input: WorkflowInput,
    ) -> Result<RunHandle, EngineError>;

    /// Wait for a run to finish; non-completed outcomes are
    /// [`EngineError::WorkflowFailed`].
    async fn wait_for_result(&self, handle: &RunHandle) -> Result<ResultMap, EngineError>;

    /// Wait at most `timeout` for a run to reach a terminal status.
    async fn wait_for_terminal(
        &self,
        handle: &RunHandle,
        timeout: Duration,
    ) -> Result<WorkflowStatus, EngineError>;

    /// Request cancellation. Canceling a finished run is a no-op.
    async fn cancel_workflow(&self, handle: &RunHandle) -> Result<(), EngineError>;

    async fn describe_workflow(&self, handle: &RunHandle) -> Result<ExecutionInfo, EngineError>;

    async fn list_workflows(&self, query: &ListQuery) -> Result<Vec<ExecutionInfo>, EngineError>;

    async fn create_schedule(&self, spec: ScheduleSpec) -> Result<(), EngineError>;

    async fn update_schedule(
        &self,
        schedule_id: &ScheduleId,
        update: ScheduleUpdate,
    ) -> Result<(), EngineError>;

    async fn pause_schedule(&self, schedule_id: &ScheduleId, note: &str) -> Result<(), EngineError>;

    async fn unpause_schedule(&self, schedule_id: &ScheduleId, note: &str)
        -> Result<(), EngineError>;

    /// Start the schedule's action now, paused or not. Returns `None` when
    /// the overlap policy skipped the run, and
    /// [`EngineError::ActionMismatch`] when the schedule's action is not
    /// `expected`.
    async fn trigger_schedule(
        &self,
        schedule_id: &ScheduleId,
        expected: Command,
    ) -> Result<Option<RunHandle>, EngineError>;

    async fn delete_schedule(&self, schedule_id: &ScheduleId) -> Result<(), EngineError>;

    async fn describe_schedule(&self, schedule_id: &ScheduleId) -> Result<ScheduleDescription, EngineError>;
}
