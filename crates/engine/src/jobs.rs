// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job data access consumed by the orchestrator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use olake_core::{JobData, JobId};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("job store: {0}")]
    Storage(String),
}

/// Read-mostly job rows owned by the CRUD layer.
///
/// The orchestrator reads job definitions and writes back only the
/// checkpoint state and active flag after a run.
#[async_trait]
pub trait JobDataService: Send + Sync + 'static {
    async fn get_job_data(&self, job_id: JobId) -> Result<JobData, JobStoreError>;

    async fn update_job_state(&self, job_id: JobId, state: &str, active: bool) -> Result<(), JobStoreError>;

    /// Replace only the checkpoint, leaving `active` as currently stored.
    async fn save_checkpoint(&self, job_id: JobId, state: &str) -> Result<(), JobStoreError>;

    /// Insert or replace a job row, returning the previous row.
    async fn save_job_data(&self, job: &JobData) -> Result<Option<JobData>, JobStoreError>;

    async fn delete_job_data(&self, job_id: JobId) -> Result<Option<JobData>, JobStoreError>;
}

/// In-memory job rows.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<BTreeMap<JobId, JobData>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_jobs(jobs: impl IntoIterator<Item = JobData>) -> Self {
        Self { jobs: Mutex::new(jobs.into_iter().map(|job| (job.job_id, job)).collect()) }
    }

    /// Every job, ordered by id.
    pub fn snapshot(&self) -> Vec<JobData> {
        self.jobs.lock().values().cloned().collect()
    }
}

#[async_trait]
impl JobDataService for MemoryJobStore {
    async fn get_job_data(&self, job_id: JobId) -> Result<JobData, JobStoreError> {
        self.jobs.lock().get(&job_id).cloned().ok_or(JobStoreError::NotFound(job_id))
    }

    async fn update_job_state(&self, job_id: JobId, state: &str, active: bool) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
        job.state = state.to_string();
        job.active = active;
        Ok(())
    }

    async fn save_checkpoint(&self, job_id: JobId, state: &str) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock();
        jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?.state = state.to_string();
        Ok(())
    }

    async fn save_job_data(&self, job: &JobData) -> Result<Option<JobData>, JobStoreError> {
        Ok(self.jobs.lock().insert(job.job_id, job.clone()))
    }

    async fn delete_job_data(&self, job_id: JobId) -> Result<Option<JobData>, JobStoreError> {
        Ok(self.jobs.lock().remove(&job_id))
    }
}
