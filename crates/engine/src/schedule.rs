// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule Manager: one cron schedule per job.
//!
//! Schedule and workflow ids derive from `(project, job)`, so every
//! operation here is addressable without a persisted index. In-flight runs
//! of a job are found by listing the lexical id range its schedule's runs
//! fall into.

use std::sync::Arc;
use std::time::Duration;

use olake_core::{
    to_cron, workflow_and_schedule_id, workflow_id_range, Command, FrequencyError, JobData, JobId,
    ProjectId, ScheduleId, WorkflowId,
};
use thiserror::Error;

use crate::runtime::{
    EngineError, ExecutionInfo, ListQuery, RunHandle, ScheduleAction, ScheduleDescription,
    ScheduleSpec, ScheduleUpdate, WorkflowEngine, WorkflowStatus,
};
use crate::workflow::{execution_timeout, WorkflowInput};

/// Poll interval while waiting for a job's runs to stop.
const STOP_POLL: Duration = Duration::from_millis(200);

pub struct ScheduleManager<E: WorkflowEngine> {
    engine: Arc<E>,
    task_queue: String,
}

impl<E: WorkflowEngine> Clone for ScheduleManager<E> {
    fn clone(&self) -> Self {
        Self { engine: Arc::clone(&self.engine), task_queue: self.task_queue.clone() }
    }
}

impl<E: WorkflowEngine> ScheduleManager<E> {
    pub fn new(engine: Arc<E>, task_queue: impl Into<String>) -> Self {
        Self { engine, task_queue: task_queue.into() }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn task_queue(&self) -> &str {
        &self.task_queue
    }

    pub fn ids(project: &ProjectId, job: JobId) -> (WorkflowId, ScheduleId) {
        workflow_and_schedule_id(project, job)
    }

    /// The schedule's normal action: run Sync for the job.
    pub fn sync_action(&self, project: &ProjectId, job: JobId) -> ScheduleAction {
        let (workflow_id, _) = workflow_and_schedule_id(project, job);
        ScheduleAction {
            workflow_id,
            task_queue: self.task_queue.clone(),
            execution_timeout: execution_timeout(Command::Sync),
            input: WorkflowInput::Sync { project_id: project.clone(), job_id: job },
        }
    }

    /// Temporary action used while a job's destination is being cleared.
    pub fn clear_destination_action(
        &self,
        project: &ProjectId,
        job: JobId,
        streams_config: &str,
    ) -> ScheduleAction {
        let (workflow_id, _) = workflow_and_schedule_id(project, job);
        ScheduleAction {
            workflow_id,
            task_queue: self.task_queue.clone(),
            execution_timeout: execution_timeout(Command::ClearDestination),
            input: WorkflowInput::ClearDestination {
                project_id: project.clone(),
                job_id: job,
                streams_config: streams_config.to_string(),
            },
        }
    }

    /// Install the job's Sync schedule. Inactive jobs start paused.
    pub async fn create_schedule(&self, job: &JobData) -> Result<ScheduleId, ScheduleError> {
        let cron = to_cron(&job.frequency)?;
        let (_, schedule_id) = workflow_and_schedule_id(&job.project_id, job.job_id);
        self.engine
            .create_schedule(ScheduleSpec {
                schedule_id: schedule_id.clone(),
                cron,
                action: self.sync_action(&job.project_id, job.job_id),
                paused: !job.active,
            })
            .await?;
        Ok(schedule_id)
    }

    /// Change the frequency and optionally the bound action.
    pub async fn update_schedule(
        &self,
        project: &ProjectId,
        job: JobId,
        frequency: Option<&str>,
        action: Option<ScheduleAction>,
    ) -> Result<(), ScheduleError> {
        let cron = frequency.map(to_cron).transpose()?;
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        self.engine.update_schedule(&schedule_id, ScheduleUpdate { cron, action }).await?;
        Ok(())
    }

    pub async fn pause_schedule(&self, project: &ProjectId, job: JobId, note: &str) -> Result<(), ScheduleError> {
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        Ok(self.engine.pause_schedule(&schedule_id, note).await?)
    }

    pub async fn resume_schedule(&self, project: &ProjectId, job: JobId, note: &str) -> Result<(), ScheduleError> {
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        Ok(self.engine.unpause_schedule(&schedule_id, note).await?)
    }

    pub async fn delete_schedule(&self, project: &ProjectId, job: JobId) -> Result<(), ScheduleError> {
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        Ok(self.engine.delete_schedule(&schedule_id).await?)
    }

    /// Run the schedule's current action now if it is `operation`. `None`
    /// when a run is already in flight.
    pub async fn trigger_schedule(
        &self,
        project: &ProjectId,
        job: JobId,
        operation: Command,
    ) -> Result<Option<RunHandle>, ScheduleError> {
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        Ok(self.engine.trigger_schedule(&schedule_id, operation).await?)
    }

    pub async fn describe_schedule(&self, project: &ProjectId, job: JobId) -> Result<ScheduleDescription, ScheduleError> {
        let (_, schedule_id) = workflow_and_schedule_id(project, job);
        Ok(self.engine.describe_schedule(&schedule_id).await?)
    }

    /// Every run of the job's schedule, optionally filtered.
    pub async fn list_runs(
        &self,
        project: &ProjectId,
        job: JobId,
        status: Option<WorkflowStatus>,
        operation: Option<Command>,
    ) -> Result<Vec<ExecutionInfo>, ScheduleError> {
        let query = ListQuery { id_range: Some(workflow_id_range(project, job)), status, operation };
        Ok(self.engine.list_workflows(&query).await?)
    }

    pub async fn is_running(&self, project: &ProjectId, job: JobId, operation: Command) -> Result<bool, ScheduleError> {
        let running = self.list_runs(project, job, Some(WorkflowStatus::Running), Some(operation)).await?;
        Ok(!running.is_empty())
    }

    /// Cancel the job's running executions, optionally only those of one
    /// operation. Returns how many were canceled; none running is not an
    /// error.
    pub async fn cancel_running(
        &self,
        project: &ProjectId,
        job: JobId,
        operation: Option<Command>,
    ) -> Result<usize, ScheduleError> {
        let running = self.list_runs(project, job, Some(WorkflowStatus::Running), operation).await?;
        for info in &running {
            self.engine.cancel_workflow(&info.handle()).await?;
            tracing::info!(job_id = %job, workflow_id = %info.workflow_id, operation = %info.operation, "canceled run");
        }
        if running.is_empty() {
            tracing::debug!(job_id = %job, "no running executions to cancel");
        }
        Ok(running.len())
    }

    /// Wait until no Sync of the job is running, at most `timeout`.
    pub async fn wait_for_sync_to_stop(
        &self,
        project: &ProjectId,
        job: JobId,
        timeout: Duration,
    ) -> Result<(), ScheduleError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let running = self.list_runs(project, job, Some(WorkflowStatus::Running), Some(Command::Sync)).await?;
            let Some(info) = running.first() else {
                return Ok(());
            };
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ScheduleError::Engine(EngineError::WaitTimeout(info.workflow_id.clone())));
            }
            tracing::info!(job_id = %job, workflow_id = %info.workflow_id, "waiting for sync to stop");
            match self.engine.wait_for_terminal(&info.handle(), remaining).await {
                Ok(_) => {}
                Err(EngineError::WorkflowNotFound(_)) => tokio::time::sleep(STOP_POLL.min(remaining)).await,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Point the schedule back at Sync after a clear-destination run and
    /// unpause it when the job is active.
    pub async fn restore_sync(&self, project: &ProjectId, job: JobId, active: bool) -> Result<(), ScheduleError> {
        self.update_schedule(project, job, None, Some(self.sync_action(project, job))).await?;
        if active {
            self.resume_schedule(project, job, "clear-destination finished").await?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Frequency(#[from] FrequencyError),
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
