// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed job rows.
//!
//! The whole table is rewritten on every change: serialized to a `.tmp`
//! sibling, then renamed over the previous file. Memory is only updated
//! once the write has landed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use olake_core::{JobData, JobId};
use olake_engine::{JobDataService, JobStoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current job file schema version
pub const CURRENT_JOBS_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported job file version {0}")]
    UnsupportedVersion(u32),
}

impl From<StorageError> for JobStoreError {
    fn from(e: StorageError) -> Self {
        JobStoreError::Storage(e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JobsFile {
    #[serde(rename = "v")]
    version: u32,
    jobs: Vec<JobData>,
}

pub struct FileJobStore {
    path: PathBuf,
    jobs: Mutex<BTreeMap<JobId, JobData>>,
    /// Serializes writers so file and memory change in the same order
    writer: tokio::sync::Mutex<()>,
}

impl FileJobStore {
    /// Open the job file at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let jobs = match std::fs::read(&path) {
            Ok(bytes) => {
                let file: JobsFile = serde_json::from_slice(&bytes)?;
                if file.version != CURRENT_JOBS_VERSION {
                    return Err(StorageError::UnsupportedVersion(file.version));
                }
                file.jobs.into_iter().map(|job| (job.job_id, job)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, jobs: Mutex::new(jobs), writer: tokio::sync::Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Every job, ordered by id.
    pub fn jobs(&self) -> Vec<JobData> {
        self.jobs.lock().values().cloned().collect()
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<JobId, JobData>) -> Result<T, JobStoreError>,
    ) -> Result<T, JobStoreError> {
        let _writer = self.writer.lock().await;
        let mut next = self.jobs.lock().clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *self.jobs.lock() = next;
        Ok(out)
    }

    async fn persist(&self, jobs: &BTreeMap<JobId, JobData>) -> Result<(), StorageError> {
        let file = JobsFile { version: CURRENT_JOBS_VERSION, jobs: jobs.values().cloned().collect() };
        let bytes = serde_json::to_vec_pretty(&file)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobDataService for FileJobStore {
    async fn get_job_data(&self, job_id: JobId) -> Result<JobData, JobStoreError> {
        self.jobs.lock().get(&job_id).cloned().ok_or(JobStoreError::NotFound(job_id))
    }

    async fn update_job_state(&self, job_id: JobId, state: &str, active: bool) -> Result<(), JobStoreError> {
        self.mutate(|jobs| {
            let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;
            job.state = state.to_string();
            job.active = active;
            Ok(())
        })
        .await
    }

    async fn save_checkpoint(&self, job_id: JobId, state: &str) -> Result<(), JobStoreError> {
        self.mutate(|jobs| {
            jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?.state = state.to_string();
            Ok(())
        })
        .await
    }

    async fn save_job_data(&self, job: &JobData) -> Result<Option<JobData>, JobStoreError> {
        self.mutate(|jobs| Ok(jobs.insert(job.job_id, job.clone()))).await
    }

    async fn delete_job_data(&self, job_id: JobId) -> Result<Option<JobData>, JobStoreError> {
        self.mutate(|jobs| Ok(jobs.remove(&job_id))).await
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
