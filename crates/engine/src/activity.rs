// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activities: turn workflow inputs into connector executions.
//!
//! [`Worker`] is registered on a task queue and runs every workflow type.
//! Each workflow is one activity call: build the connector's argv and
//! config files, execute it on the backend under the activity's retry
//! policy, and for Sync and ClearDestination persist the returned
//! checkpoint state.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use olake_adapters::workdir::{
    container_path, CONFIG_FILE, STATE_FILE, STREAMS_FILE, WRITER_FILE,
};
use olake_adapters::ExecutionBackend;
use olake_core::{
    supports_version, Command, ConfigFile, ConnectorRef, ConnectorRole, ExecutionRequest, JobData,
    JobId, ProjectId, ResultMap, CLEAR_DESTINATION_MIN_VERSION, MAX_DISCOVER_THREADS_MIN_VERSION,
};
use serde_json::json;

use crate::jobs::{JobDataService, JobStoreError};
use crate::runtime::{WorkflowContext, WorkflowEngine, WorkflowRunner};
use crate::schedule::ScheduleManager;
use crate::workflow::{activity_name, activity_options, WorkflowError, WorkflowInput};

/// Connector settings shared by every execution.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Passed to connectors as `--encryption-key`
    pub secret_key: Option<String>,
    pub max_discover_threads: Option<u32>,
    /// Driver image that runs destination `check` and `spec`
    pub destination_driver: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { secret_key: None, max_discover_threads: None, destination_driver: "postgres".to_string() }
    }
}

pub struct Worker<B, J, E>
where
    B: ExecutionBackend,
    J: JobDataService,
    E: WorkflowEngine,
{
    backend: Arc<B>,
    jobs: Arc<J>,
    schedules: ScheduleManager<E>,
    config: WorkerConfig,
}

impl<B, J, E> Worker<B, J, E>
where
    B: ExecutionBackend,
    J: JobDataService,
    E: WorkflowEngine,
{
    pub fn new(backend: Arc<B>, jobs: Arc<J>, schedules: ScheduleManager<E>, config: WorkerConfig) -> Self {
        Self { backend, jobs, schedules, config }
    }

    async fn discover(
        &self,
        ctx: &WorkflowContext,
        connector: ConnectorRef,
        job_id: Option<JobId>,
        streams_config: Option<String>,
    ) -> Result<ResultMap, WorkflowError> {
        let mut args = vec![Command::Discover.cli_name().to_string(), "--config".to_string(), container_path(CONFIG_FILE)];
        let mut configs = vec![ConfigFile::new(CONFIG_FILE, connector.config)];
        if let Some(streams) = streams_config {
            args.extend(["--streams".to_string(), container_path(STREAMS_FILE)]);
            configs.push(ConfigFile::new(STREAMS_FILE, streams));
        }
        if let Some(threads) = self.config.max_discover_threads {
            if supports_version(&connector.version, MAX_DISCOVER_THREADS_MIN_VERSION) {
                args.extend(["--max-discover-threads".to_string(), threads.to_string()]);
            }
        }
        self.push_encryption_key(&mut args);

        let mut request =
            ExecutionRequest::new(Command::Discover, connector.connector_type, connector.version, ctx.workflow_id.clone())
                .args(args)
                .configs(configs)
                .output_file(STREAMS_FILE);
        request.job_id = job_id;
        self.execute(ctx, request).await
    }

    async fn check(
        &self,
        ctx: &WorkflowContext,
        connector: ConnectorRef,
        role: ConnectorRole,
    ) -> Result<ResultMap, WorkflowError> {
        let mut args = vec![Command::Check.cli_name().to_string()];
        let (connector_type, configs) = match role {
            ConnectorRole::Source => {
                args.extend(["--config".to_string(), container_path(CONFIG_FILE)]);
                (connector.connector_type, vec![ConfigFile::new(CONFIG_FILE, connector.config)])
            }
            ConnectorRole::Destination => {
                args.extend(["--destination".to_string(), container_path(WRITER_FILE)]);
                let writer = writer_config(&connector)?;
                (self.config.destination_driver.clone(), vec![ConfigFile::new(WRITER_FILE, writer)])
            }
        };
        self.push_encryption_key(&mut args);

        let request = ExecutionRequest::new(Command::Check, connector_type, connector.version, ctx.workflow_id.clone())
            .args(args)
            .configs(configs);
        self.execute(ctx, request).await
    }

    async fn spec(
        &self,
        ctx: &WorkflowContext,
        connector_type: String,
        version: String,
        role: ConnectorRole,
    ) -> Result<ResultMap, WorkflowError> {
        let mut args = vec![Command::Spec.cli_name().to_string()];
        let image = match role {
            ConnectorRole::Source => connector_type,
            ConnectorRole::Destination => {
                args.extend(["--destination-type".to_string(), connector_type]);
                self.config.destination_driver.clone()
            }
        };
        let request = ExecutionRequest::new(Command::Spec, image, version, ctx.workflow_id.clone()).args(args);
        self.execute(ctx, request).await
    }

    async fn sync(&self, ctx: &WorkflowContext, job_id: JobId) -> Result<ResultMap, WorkflowError> {
        let job = self.job(job_id).await?;
        let mut args = vec![
            Command::Sync.cli_name().to_string(),
            "--config".to_string(),
            container_path(CONFIG_FILE),
            "--catalog".to_string(),
            container_path(STREAMS_FILE),
        ];
        args.extend(self.destination_args(&job));

        let request = ExecutionRequest::new(
            Command::Sync,
            job.source.connector_type.clone(),
            job.source.version.clone(),
            ctx.workflow_id.clone(),
        )
        .args(args)
        .configs(job_configs(&job, &job.streams_config)?)
        .job_id(job_id)
        .output_file(STATE_FILE);

        let result = self.execute(ctx, request).await?;
        self.save_state(&job, &result).await?;
        Ok(result)
    }

    async fn clear_destination(
        &self,
        ctx: &WorkflowContext,
        job_id: JobId,
        streams_config: &str,
    ) -> Result<ResultMap, WorkflowError> {
        let job = self.job(job_id).await?;
        if !supports_version(&job.source.version, CLEAR_DESTINATION_MIN_VERSION) {
            return Err(WorkflowError::UnsupportedVersion {
                connector: job.source.connector_type.clone(),
                version: job.source.version.clone(),
                command: Command::ClearDestination,
                minimum: CLEAR_DESTINATION_MIN_VERSION.to_string(),
            });
        }

        let mut args = vec![
            Command::ClearDestination.cli_name().to_string(),
            "--config".to_string(),
            container_path(CONFIG_FILE),
            "--streams".to_string(),
            container_path(STREAMS_FILE),
        ];
        args.extend(self.destination_args(&job));

        let request = ExecutionRequest::new(
            Command::ClearDestination,
            job.source.connector_type.clone(),
            job.source.version.clone(),
            ctx.workflow_id.clone(),
        )
        .args(args)
        .configs(job_configs(&job, streams_config)?)
        .job_id(job_id)
        .output_file(STATE_FILE);

        let result = self.execute(ctx, request).await?;
        self.save_state(&job, &result).await?;
        Ok(result)
    }

    /// Point the schedule back at Sync whatever the clear-destination
    /// outcome was.
    async fn finish_clear_destination(&self, project_id: &ProjectId, job_id: JobId) {
        let active = match self.jobs.get_job_data(job_id).await {
            Ok(job) => job.active,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "job lookup failed, leaving schedule paused");
                false
            }
        };
        match self.schedules.restore_sync(project_id, job_id, active).await {
            Ok(()) => tracing::info!(job_id = %job_id, active, "restored sync schedule"),
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "failed to restore sync schedule"),
        }
    }

    /// Flags shared by Sync and ClearDestination after the source flags.
    fn destination_args(&self, job: &JobData) -> Vec<String> {
        let mut args = vec![
            "--destination".to_string(),
            container_path(WRITER_FILE),
            "--state".to_string(),
            container_path(STATE_FILE),
        ];
        self.push_encryption_key(&mut args);
        if let Some(prefix) = job.destination_database_prefix.as_deref().filter(|p| !p.is_empty()) {
            args.extend(["--destination-database-prefix".to_string(), prefix.to_string()]);
        }
        args
    }

    fn push_encryption_key(&self, args: &mut Vec<String>) {
        if let Some(key) = self.config.secret_key.as_deref().filter(|k| !k.is_empty()) {
            args.extend(["--encryption-key".to_string(), key.to_string()]);
        }
    }

    async fn job(&self, job_id: JobId) -> Result<JobData, WorkflowError> {
        self.jobs.get_job_data(job_id).await.map_err(|e| match e {
            JobStoreError::NotFound(id) => WorkflowError::JobNotFound(id),
            other => WorkflowError::JobData(other.to_string()),
        })
    }

    /// Persist the checkpoint a run returned. A result parsed from plain
    /// logs carries no state and leaves the stored one untouched.
    async fn save_state(&self, job: &JobData, result: &ResultMap) -> Result<(), WorkflowError> {
        if result.contains_key("raw_output") {
            tracing::warn!(job_id = %job.job_id, "connector returned no state, keeping previous checkpoint");
            return Ok(());
        }
        let state = serde_json::to_string(result).map_err(|e| WorkflowError::JobData(e.to_string()))?;
        self.jobs.save_checkpoint(job.job_id, &state).await.map_err(|e| WorkflowError::JobData(e.to_string()))
    }

    /// Run one activity on the backend under its retry policy.
    async fn execute(&self, ctx: &WorkflowContext, request: ExecutionRequest) -> Result<ResultMap, WorkflowError> {
        let command = request.command;
        let options = activity_options(command);
        let request = request.timeout(options.start_to_close);
        let activity = activity_name(command);

        let mut attempt = 1;
        loop {
            tracing::info!(
                activity,
                workflow_id = %ctx.workflow_id,
                backend = self.backend.name(),
                attempt,
                "running activity"
            );
            let start = Instant::now();
            let error = match self.backend.execute(&request, ctx.cancel.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };
            let elapsed_ms = start.elapsed().as_millis() as u64;

            if !error.is_retryable() || !options.retry.allows(attempt + 1) {
                tracing::error!(activity, workflow_id = %ctx.workflow_id, attempt, elapsed_ms, error = %error, "activity failed");
                return Err(error.into());
            }
            let delay = options.retry.backoff(attempt);
            tracing::warn!(
                activity,
                workflow_id = %ctx.workflow_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "activity failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel.cancelled() => return Err(WorkflowError::Canceled),
            }
            attempt += 1;
        }
    }
}

#[async_trait]
impl<B, J, E> WorkflowRunner for Worker<B, J, E>
where
    B: ExecutionBackend,
    J: JobDataService,
    E: WorkflowEngine,
{
    async fn run(&self, ctx: WorkflowContext, input: WorkflowInput) -> Result<ResultMap, WorkflowError> {
        match input {
            WorkflowInput::Discover { connector, job_id, streams_config } => {
                self.discover(&ctx, connector, job_id, streams_config).await
            }
            WorkflowInput::Check { connector, role } => self.check(&ctx, connector, role).await,
            WorkflowInput::Spec { connector_type, version, role } => {
                self.spec(&ctx, connector_type, version, role).await
            }
            WorkflowInput::Sync { job_id, .. } => self.sync(&ctx, job_id).await,
            WorkflowInput::ClearDestination { project_id, job_id, streams_config } => {
                let result = self.clear_destination(&ctx, job_id, &streams_config).await;
                self.finish_clear_destination(&project_id, job_id).await;
                result
            }
        }
    }
}

/// Destination config wrapped the way connectors expect it.
fn writer_config(destination: &ConnectorRef) -> Result<String, WorkflowError> {
    let writer: serde_json::Value = serde_json::from_str(&destination.config)
        .map_err(|e| WorkflowError::JobData(format!("invalid destination config: {}", e)))?;
    Ok(json!({ "type": destination.connector_type.to_uppercase(), "writer": writer }).to_string())
}

fn job_configs(job: &JobData, streams_config: &str) -> Result<Vec<ConfigFile>, WorkflowError> {
    Ok(vec![
        ConfigFile::new(CONFIG_FILE, job.source.config.clone()),
        ConfigFile::new(STREAMS_FILE, streams_config),
        ConfigFile::new(WRITER_FILE, writer_config(&job.destination)?),
        ConfigFile::new(STATE_FILE, job.state.clone()),
    ])
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
