// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution backend contract.
//!
//! A backend takes one [`ExecutionRequest`], runs the connector container to
//! completion and returns its structured result. Container or pod cleanup
//! runs on every path, including timeout and cancellation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use olake_core::{ExecutionRequest, ResultMap};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::k8s::JobMappingPolicy;

/// Errors from a single connector execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },
    #[error("failed to create container: {0}")]
    Create(String),
    #[error("connector exited with code {code}: {logs}")]
    ExitCode { code: i64, logs: String },
    #[error("pod failed: {logs}")]
    PodFailed { logs: String },
    #[error("execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("execution canceled")]
    Canceled,
    #[error("config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file name: {0:?}")]
    InvalidConfigName(String),
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    #[error("docker error: {0}")]
    Docker(String),
}

impl ExecutionError {
    /// Timeouts and cancellation are final; everything else may be retried
    /// if the workflow's retry policy allows another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecutionError::Timeout(_) | ExecutionError::Canceled)
    }
}

/// Runs one containerized connector execution.
#[async_trait]
pub trait ExecutionBackend: Send + Sync + 'static {
    /// Short backend name for logs (`docker`, `kubernetes`)
    fn name(&self) -> &'static str;

    /// Run `request` to completion.
    ///
    /// `cancel` is the workflow's cancellation signal. The backend stops
    /// waiting, removes the container, and returns [`ExecutionError::Canceled`].
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError>;

    /// Remove leftovers from executions of a previous worker process.
    async fn cleanup_stale(&self) -> Result<usize, ExecutionError> {
        Ok(0)
    }

    /// The job→node mapping this backend places executions by, if any.
    fn job_mapping(&self) -> Option<Arc<JobMappingPolicy>> {
        None
    }
}

/// Connector image reference: `{prefix}{connector}:{version}`.
pub fn image_name(prefix: &str, connector_type: &str, version: &str) -> String {
    format!("{}{}:{}", prefix, connector_type, version)
}
