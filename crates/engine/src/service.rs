// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job operations exposed to the CRUD layer.
//!
//! Every operation delegates to the Schedule Manager and the workflow
//! engine. Writes that span the job store and the engine follow a
//! snapshot, attempt, compensate pattern: the previous job row is restored
//! when the engine step fails, and a failed restore is reported as
//! [`ServiceError::CompensationFailed`] instead of being swallowed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use olake_core::{
    directory_id, stream_difference, supports_version, to_cron, Command, ConnectorRef,
    ConnectorRole, FrequencyError, JobData, JobId, ProjectId, ResultMap, ScheduleId, StreamsError,
    WorkflowId, CLEAR_DESTINATION_MIN_VERSION,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::jobs::{JobDataService, JobStoreError};
use crate::runtime::{EngineError, RunHandle, StartOptions, WorkflowEngine, WorkflowStatus};
use crate::schedule::{ScheduleError, ScheduleManager};
use crate::workflow::{execution_timeout, WorkflowInput};

/// Default task queue for Docker-backed workers.
pub const DOCKER_TASK_QUEUE: &str = "OLAKE_DOCKER_TASK_QUEUE";
/// Default task queue for Kubernetes-backed workers.
pub const K8S_TASK_QUEUE: &str = "OLAKE_K8S_TASK_QUEUE";

const CLEAR_NOTE: &str = "clear-destination in progress";

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub task_queue: String,
    /// How long clear-destination waits for a running sync to stop
    pub clear_wait_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { task_queue: DOCKER_TASK_QUEUE.to_string(), clear_wait_timeout: Duration::from_secs(600) }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    JobStore(#[from] JobStoreError),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error(transparent)]
    Frequency(#[from] FrequencyError),
    #[error(transparent)]
    Streams(#[from] StreamsError),
    #[error("clear-destination in progress for job {0}")]
    ClearDestinationInProgress(JobId),
    #[error("{connector} {version} does not support clear-destination (requires {minimum})")]
    UnsupportedVersion { connector: String, version: String, minimum: String },
    #[error("sync for job {job_id} did not stop: {source}")]
    SyncStillRunning {
        job_id: JobId,
        #[source]
        source: ScheduleError,
    },
    #[error("{cause}; restoring previous state also failed: {compensation}")]
    CompensationFailed { cause: String, compensation: String },
    #[error("{0}")]
    Workflow(String),
}

impl From<ScheduleError> for ServiceError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Engine(e) => ServiceError::Engine(e),
            ScheduleError::Frequency(e) => ServiceError::Frequency(e),
        }
    }
}

/// One run of a job, as listed by [`JobService::get_job_tasks`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTask {
    pub workflow_id: WorkflowId,
    pub run_id: String,
    pub operation: Command,
    pub status: WorkflowStatus,
    pub start_time: DateTime<Utc>,
    pub close_time: Option<DateTime<Utc>>,
    /// Execution directory holding the run's configs and logs
    pub directory_id: String,
}

pub struct JobService<E: WorkflowEngine, J: JobDataService> {
    schedules: ScheduleManager<E>,
    jobs: Arc<J>,
    config: ServiceConfig,
}

impl<E: WorkflowEngine, J: JobDataService> JobService<E, J> {
    pub fn new(engine: Arc<E>, jobs: Arc<J>, config: ServiceConfig) -> Self {
        let schedules = ScheduleManager::new(engine, config.task_queue.clone());
        Self { schedules, jobs, config }
    }

    pub fn schedules(&self) -> &ScheduleManager<E> {
        &self.schedules
    }

    /// Store a new job and install its schedule.
    pub async fn create_job(&self, job: JobData) -> Result<ScheduleId, ServiceError> {
        to_cron(&job.frequency)?;
        let previous = self.jobs.save_job_data(&job).await?;

        match self.schedules.create_schedule(&job).await {
            Ok(schedule_id) => {
                tracing::info!(job_id = %job.job_id, schedule_id = %schedule_id, "job created");
                Ok(schedule_id)
            }
            Err(e) => {
                let restore = match previous {
                    Some(previous) => self.jobs.save_job_data(&previous).await.map(|_| ()),
                    None => self.jobs.delete_job_data(job.job_id).await.map(|_| ()),
                };
                Err(compensated(e.into(), restore))
            }
        }
    }

    /// Replace a job's definition and bring its schedule in line.
    pub async fn update_job(&self, job: JobData) -> Result<(), ServiceError> {
        to_cron(&job.frequency)?;
        let previous = self.job(job.job_id).await?;
        self.jobs.save_job_data(&job).await?;

        let attempt = async {
            self.schedules
                .update_schedule(
                    &job.project_id,
                    job.job_id,
                    Some(&job.frequency),
                    Some(self.schedules.sync_action(&job.project_id, job.job_id)),
                )
                .await?;
            if job.active != previous.active {
                self.set_schedule_active(&job.project_id, job.job_id, job.active).await?;
            }
            Ok::<(), ScheduleError>(())
        };
        if let Err(e) = attempt.await {
            let restore = self.jobs.save_job_data(&previous).await.map(|_| ());
            return Err(compensated(e.into(), restore));
        }
        tracing::info!(job_id = %job.job_id, frequency = %job.frequency, "job updated");
        Ok(())
    }

    /// Cancel the job's runs, drop its schedule and its row.
    pub async fn delete_job(&self, project: &ProjectId, job_id: JobId) -> Result<usize, ServiceError> {
        let canceled = self.schedules.cancel_running(project, job_id, None).await?;
        match self.schedules.delete_schedule(project, job_id).await {
            Ok(()) | Err(ScheduleError::Engine(EngineError::ScheduleNotFound(_))) => {}
            Err(e) => return Err(e.into()),
        }
        self.jobs.delete_job_data(job_id).await?;
        tracing::info!(job_id = %job_id, canceled, "job deleted");
        Ok(canceled)
    }

    /// Run the job's Sync now. `None` when a sync is already running.
    pub async fn sync_job(&self, project: &ProjectId, job_id: JobId) -> Result<Option<RunHandle>, ServiceError> {
        if self.schedules.is_running(project, job_id, Command::ClearDestination).await? {
            return Err(ServiceError::ClearDestinationInProgress(job_id));
        }
        let handle = match self.schedules.trigger_schedule(project, job_id, Command::Sync).await {
            Ok(handle) => handle,
            Err(ScheduleError::Engine(EngineError::ActionMismatch { actual: Command::ClearDestination, .. })) => {
                return Err(ServiceError::ClearDestinationInProgress(job_id));
            }
            Err(e) => return Err(e.into()),
        };
        match &handle {
            Some(h) => tracing::info!(job_id = %job_id, workflow_id = %h.workflow_id, "sync triggered"),
            None => tracing::info!(job_id = %job_id, "sync already running"),
        }
        Ok(handle)
    }

    /// Cancel whatever is running for the job. Returns how many runs were
    /// canceled.
    pub async fn cancel_job_run(&self, project: &ProjectId, job_id: JobId) -> Result<usize, ServiceError> {
        Ok(self.schedules.cancel_running(project, job_id, None).await?)
    }

    /// Toggle the job's active flag and pause or resume its schedule.
    pub async fn activate_job(&self, project: &ProjectId, job_id: JobId, active: bool) -> Result<(), ServiceError> {
        let job = self.job(job_id).await?;
        self.jobs.update_job_state(job_id, &job.state, active).await?;

        if let Err(e) = self.set_schedule_active(project, job_id, active).await {
            let restore = self.jobs.update_job_state(job_id, &job.state, job.active).await;
            return Err(compensated(e.into(), restore));
        }
        tracing::info!(job_id = %job_id, active, "job activation changed");
        Ok(())
    }

    /// Clear the destination data of the given streams and re-sync them.
    ///
    /// The schedule is paused and any running sync must stop within
    /// `clear_wait_timeout`; the schedule's action is then swapped to
    /// ClearDestination and triggered. The workflow restores the Sync
    /// action when it finishes.
    pub async fn clear_destination(
        &self,
        project: &ProjectId,
        job_id: JobId,
        streams_config: &str,
    ) -> Result<RunHandle, ServiceError> {
        let job = self.job(job_id).await?;
        if !supports_version(&job.source.version, CLEAR_DESTINATION_MIN_VERSION) {
            return Err(ServiceError::UnsupportedVersion {
                connector: job.source.connector_type,
                version: job.source.version,
                minimum: CLEAR_DESTINATION_MIN_VERSION.to_string(),
            });
        }
        if self.schedules.is_running(project, job_id, Command::ClearDestination).await? {
            return Err(ServiceError::ClearDestinationInProgress(job_id));
        }

        self.schedules.pause_schedule(project, job_id, CLEAR_NOTE).await?;
        if let Err(e) = self.schedules.wait_for_sync_to_stop(project, job_id, self.config.clear_wait_timeout).await {
            let cause = ServiceError::SyncStillRunning { job_id, source: e };
            let restore = self.set_schedule_active(project, job_id, job.active).await;
            return Err(compensated(cause, restore));
        }

        let action = self.schedules.clear_destination_action(project, job_id, streams_config);
        let triggered = match self.schedules.update_schedule(project, job_id, None, Some(action)).await {
            Ok(()) => self.schedules.trigger_schedule(project, job_id, Command::ClearDestination).await,
            Err(e) => Err(e),
        };
        match triggered {
            Ok(Some(handle)) => {
                tracing::info!(job_id = %job_id, workflow_id = %handle.workflow_id, "clear-destination started");
                Ok(handle)
            }
            Ok(None) => {
                // A concurrent clear owns the schedule and restores it itself.
                if self.schedules.is_running(project, job_id, Command::ClearDestination).await? {
                    return Err(ServiceError::ClearDestinationInProgress(job_id));
                }
                let restore = self.schedules.restore_sync(project, job_id, job.active).await;
                Err(compensated(ServiceError::ClearDestinationInProgress(job_id), restore))
            }
            Err(e) => {
                let restore = self.schedules.restore_sync(project, job_id, job.active).await;
                Err(compensated(e.into(), restore))
            }
        }
    }

    /// Streams whose sync settings changed between two streams configs.
    pub fn get_stream_difference(&self, old: &str, new: &str) -> Result<String, ServiceError> {
        Ok(stream_difference(old, new)?)
    }

    /// Every run of the job, newest first.
    pub async fn get_job_tasks(&self, project: &ProjectId, job_id: JobId) -> Result<Vec<JobTask>, ServiceError> {
        let runs = self.schedules.list_runs(project, job_id, None, None).await?;
        Ok(runs
            .into_iter()
            .rev()
            .map(|info| JobTask {
                directory_id: directory_id(&info.workflow_id, info.operation),
                workflow_id: info.workflow_id,
                run_id: info.run_id,
                operation: info.operation,
                status: info.status,
                start_time: info.start_time,
                close_time: info.close_time,
            })
            .collect())
    }

    /// Discover the source's streams and wait for the catalog.
    pub async fn discover_streams(
        &self,
        project: &ProjectId,
        connector: ConnectorRef,
        job_id: Option<JobId>,
        streams_config: Option<String>,
    ) -> Result<ResultMap, ServiceError> {
        let workflow_id = format!("discover-{}-{}", project, Uuid::new_v4());
        self.run_interactive(workflow_id, WorkflowInput::Discover { connector, job_id, streams_config }).await
    }

    pub async fn test_connection(
        &self,
        project: &ProjectId,
        connector: ConnectorRef,
        role: ConnectorRole,
    ) -> Result<ResultMap, ServiceError> {
        let workflow_id = format!("test-connection-{}-{}", project, Uuid::new_v4());
        self.run_interactive(workflow_id, WorkflowInput::Check { connector, role }).await
    }

    pub async fn fetch_spec(
        &self,
        connector_type: &str,
        version: &str,
        role: ConnectorRole,
    ) -> Result<ResultMap, ServiceError> {
        let workflow_id = format!("fetch-spec-{}-{}", connector_type, Uuid::new_v4());
        let input = WorkflowInput::Spec { connector_type: connector_type.to_string(), version: version.to_string(), role };
        self.run_interactive(workflow_id, input).await
    }

    async fn run_interactive(&self, workflow_id: String, input: WorkflowInput) -> Result<ResultMap, ServiceError> {
        let options = StartOptions {
            workflow_id: WorkflowId::new(workflow_id),
            task_queue: self.config.task_queue.clone(),
            execution_timeout: execution_timeout(input.command()),
        };
        let engine = self.schedules.engine();
        let handle = engine.start_workflow(options, input).await?;
        match engine.wait_for_result(&handle).await {
            Ok(result) => Ok(result),
            Err(EngineError::WorkflowFailed { message, .. }) => Err(ServiceError::Workflow(message)),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_schedule_active(&self, project: &ProjectId, job_id: JobId, active: bool) -> Result<(), ScheduleError> {
        if active {
            self.schedules.resume_schedule(project, job_id, "job activated").await
        } else {
            self.schedules.pause_schedule(project, job_id, "job deactivated").await
        }
    }

    async fn job(&self, job_id: JobId) -> Result<JobData, ServiceError> {
        match self.jobs.get_job_data(job_id).await {
            Ok(job) => Ok(job),
            Err(JobStoreError::NotFound(id)) => Err(ServiceError::JobNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Attach the outcome of a compensating write to the original failure.
fn compensated<E: std::fmt::Display>(cause: ServiceError, restore: Result<(), E>) -> ServiceError {
    match restore {
        Ok(()) => {
            tracing::warn!(error = %cause, "operation failed, previous state restored");
            cause
        }
        Err(compensation) => {
            tracing::error!(error = %cause, compensation = %compensation, "operation failed and restore failed");
            ServiceError::CompensationFailed { cause: cause.to_string(), compensation: compensation.to_string() }
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
