// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution backend selection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use olake_adapters::k8s::connect_with_retry;
use olake_adapters::{
    DockerRunner, ExecutionBackend, ExecutionError, JobMappingPolicy, KubernetesExecutor,
};
use olake_core::{ExecutionRequest, ResultMap};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Config, ExecutorKind, LifecycleError};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// The backend chosen by `OLAKE_EXECUTOR`.
pub enum Backend {
    Docker(DockerRunner),
    Kubernetes(KubernetesExecutor),
}

#[async_trait]
impl ExecutionBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Docker(b) => b.name(),
            Backend::Kubernetes(b) => b.name(),
        }
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError> {
        match self {
            Backend::Docker(b) => b.execute(request, cancel).await,
            Backend::Kubernetes(b) => b.execute(request, cancel).await,
        }
    }

    async fn cleanup_stale(&self) -> Result<usize, ExecutionError> {
        match self {
            Backend::Docker(b) => b.cleanup_stale().await,
            Backend::Kubernetes(b) => b.cleanup_stale().await,
        }
    }

    fn job_mapping(&self) -> Option<Arc<JobMappingPolicy>> {
        match self {
            Backend::Docker(b) => b.job_mapping(),
            Backend::Kubernetes(b) => b.job_mapping(),
        }
    }
}

/// Parse the job→node mapping, if one is configured.
pub(crate) fn load_mapping(raw: Option<&str>) -> Result<JobMappingPolicy, LifecycleError> {
    let policy = JobMappingPolicy::new();
    if let Some(raw) = raw {
        let report = policy.load_json(raw)?;
        info!(valid = report.valid, invalid = report.invalid, "job mapping configured");
    }
    Ok(policy)
}

/// Build the configured backend. Connecting to Kubernetes is retried with
/// backoff; a final failure is fatal.
pub async fn select_backend(config: &Config) -> Result<Backend, LifecycleError> {
    match config.executor {
        ExecutorKind::Docker => {
            info!(persistent_dir = %config.docker.persistent_dir.display(), "using docker executor");
            Ok(Backend::Docker(DockerRunner::new(config.docker.clone())))
        }
        ExecutorKind::Kubernetes => {
            let mapping = Arc::new(load_mapping(config.job_mapping.as_deref())?);
            let client = connect_with_retry(CONNECT_ATTEMPTS, CONNECT_BACKOFF).await?;
            info!(namespace = %config.kubernetes.namespace, "using kubernetes executor");
            Ok(Backend::Kubernetes(KubernetesExecutor::new(client, config.kubernetes.clone(), mapping)))
        }
    }
}
