// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes execution backend: one pod per connector execution.
//!
//! # Module layout
//!
//! - [`pod`]: pod spec, labels and annotations
//! - [`labels`]: label syntax and name sanitizing
//! - [`scheduling`]: job→node mapping and affinity rules
//!
//! # Lifecycle
//!
//! ```text
//! write configs ─▶ create pod ─▶ poll phase ─▶ logs ─▶ extract result
//!                       │                                     │
//!                       └────────── delete pod (always) ◀─────┘
//! ```
//!
//! Completion is detected by polling the pod phase every
//! `poll_interval`; detection latency is bounded by that interval.

pub mod labels;
pub mod pod;
pub mod scheduling;

pub use scheduling::{build_affinity, JobMappingPolicy, LoadReport, MappingError, NodeLabels};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams};
use kube::Client;
use olake_core::{Clock, Command, ExecutionRequest, ResultMap, SystemClock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::image_name;
use crate::result::{extract_result, ResultSource};
use crate::{ExecutionBackend, ExecutionError, WorkDir};
use pod::PodParams;

/// Waiting reasons that mean the image will never start.
const IMAGE_PULL_FAILURES: [&str; 3] = ["ErrImagePull", "ImagePullBackOff", "InvalidImageName"];

/// Settings for the Kubernetes backend.
#[derive(Debug, Clone)]
pub struct KubernetesConfig {
    pub namespace: String,
    /// Claim backing the shared execution directories
    pub pvc_name: String,
    /// Shared storage root as mounted in the worker
    pub persistent_dir: PathBuf,
    pub image_prefix: String,
    pub secret_key: Option<String>,
    /// Recorded in the `created-by-worker` annotation
    pub worker_id: String,
    pub poll_interval: Duration,
    pub cpu_request: String,
    pub memory_request: String,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            pvc_name: "olake-jobs-pvc".to_string(),
            persistent_dir: PathBuf::from("/tmp/olake-config"),
            image_prefix: "olakego/source-".to_string(),
            secret_key: None,
            worker_id: "olake-worker".to_string(),
            poll_interval: Duration::from_secs(5),
            cpu_request: "500m".to_string(),
            memory_request: "1Gi".to_string(),
        }
    }
}

/// Runs connector executions as Kubernetes pods.
pub struct KubernetesExecutor<C: Clock = SystemClock> {
    client: Client,
    config: KubernetesConfig,
    workdir: WorkDir,
    mapping: Arc<JobMappingPolicy>,
    clock: C,
}

impl KubernetesExecutor<SystemClock> {
    pub fn new(client: Client, config: KubernetesConfig, mapping: Arc<JobMappingPolicy>) -> Self {
        Self::with_clock(client, config, mapping, SystemClock)
    }
}

impl<C: Clock> KubernetesExecutor<C> {
    pub fn with_clock(
        client: Client,
        config: KubernetesConfig,
        mapping: Arc<JobMappingPolicy>,
        clock: C,
    ) -> Self {
        let workdir = WorkDir::new(config.persistent_dir.clone());
        Self { client, config, workdir, mapping, clock }
    }

    pub fn mapping(&self) -> &Arc<JobMappingPolicy> {
        &self.mapping
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    async fn run(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError> {
        let directory_id = request.directory_id();
        self.workdir.write_configs(&directory_id, &request.configs).await?;

        let image = image_name(&self.config.image_prefix, &request.connector_type, &request.version);
        let labels = self.mapping.node_labels(request.job_id);
        let spec = pod::build_pod(&PodParams {
            request,
            image: image.clone(),
            namespace: self.config.namespace.clone(),
            pvc_name: self.config.pvc_name.clone(),
            directory_id: directory_id.clone(),
            secret_key: self.config.secret_key.clone(),
            worker_id: self.config.worker_id.clone(),
            cpu_request: self.config.cpu_request.clone(),
            memory_request: self.config.memory_request.clone(),
            affinity: build_affinity(labels.as_ref(), request.command),
            created_at: self.clock.now_utc(),
        });
        let pod_name = pod::pod_name(request);
        let pods = self.pods();

        tracing::info!(
            workflow_id = %request.workflow_id,
            %pod_name,
            %image,
            namespace = %self.config.namespace,
            "creating connector pod"
        );
        pods.create(&PostParams::default(), &spec)
            .await
            .map_err(|e| ExecutionError::Create(format!("pod {}: {}", pod_name, e)))?;

        // From here on the pod exists and must be deleted on every path.
        let result = async {
            let finished = self.wait_for_completion(&pods, &pod_name, &image, request.timeout, &cancel).await?;
            let logs = self.pod_logs(&pods, &pod_name).await;
            let source = result_source(&finished, request.output_file.as_deref());
            extract_result(&self.workdir, &directory_id, &source, &logs).await
        }
        .await;

        delete_pod(&pods, &pod_name).await;
        result
    }

    /// Poll the pod phase until it finishes, the timeout elapses or the
    /// execution is canceled.
    async fn wait_for_completion(
        &self,
        pods: &Api<Pod>,
        pod_name: &str,
        image: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Pod, ExecutionError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(%pod_name, "execution canceled");
                    return Err(ExecutionError::Canceled);
                }
                _ = &mut deadline => {
                    tracing::warn!(%pod_name, timeout_secs = timeout.as_secs(), "execution timed out");
                    return Err(ExecutionError::Timeout(timeout));
                }
                _ = ticker.tick() => {}
            }

            let current = match pods.get(pod_name).await {
                Ok(p) => p,
                Err(kube::Error::Api(e)) if e.code == 404 => {
                    return Err(ExecutionError::Kube(kube::Error::Api(e)));
                }
                Err(e) => {
                    tracing::debug!(%pod_name, error = %e, "pod status poll failed");
                    continue;
                }
            };

            if let Some(reason) = image_pull_failure(&current) {
                return Err(ExecutionError::ImagePull { image: image.to_string(), reason });
            }

            let succeeded = match pod_phase(&current) {
                Some("Succeeded") => true,
                Some("Failed") => {
                    let logs = self.pod_logs(pods, pod_name).await;
                    return Err(ExecutionError::PodFailed { logs });
                }
                _ => false,
            };
            if succeeded {
                return Ok(current);
            }
        }
    }

    async fn pod_logs(&self, pods: &Api<Pod>, pod_name: &str) -> String {
        let params = LogParams { container: Some("connector".to_string()), ..Default::default() };
        match pods.logs(pod_name, &params).await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::warn!(%pod_name, error = %e, "failed to fetch pod logs");
                String::new()
            }
        }
    }
}

#[async_trait]
impl<C: Clock> ExecutionBackend for KubernetesExecutor<C> {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError> {
        let start = Instant::now();
        let result = self.run(request, cancel).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(
                workflow_id = %request.workflow_id,
                command = %request.command,
                elapsed_ms,
                "pod execution completed"
            ),
            Err(e) => tracing::error!(
                workflow_id = %request.workflow_id,
                command = %request.command,
                elapsed_ms,
                error = %e,
                "pod execution failed"
            ),
        }
        result
    }

    /// Delete finished pods left behind by a previous worker.
    fn job_mapping(&self) -> Option<Arc<JobMappingPolicy>> {
        Some(Arc::clone(&self.mapping))
    }

    async fn cleanup_stale(&self) -> Result<usize, ExecutionError> {
        let pods = self.pods();
        let lp = ListParams::default().labels(&format!("{}={}", pod::MANAGED_BY_LABEL, pod::MANAGED_BY));
        let list = pods.list(&lp).await?;

        let mut deleted = 0;
        for stale in list {
            if !matches!(pod_phase(&stale), Some("Succeeded") | Some("Failed")) {
                continue;
            }
            let Some(name) = stale.metadata.name.clone() else { continue };
            tracing::info!(pod_name = %name, "deleting stale connector pod");
            if delete_pod(&pods, &name).await {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Build a Kubernetes client, retrying with exponential backoff.
///
/// Only used at startup; the caller treats the final error as fatal.
pub async fn connect_with_retry(attempts: u32, initial_backoff: Duration) -> Result<Client, kube::Error> {
    let max_backoff = Duration::from_secs(30);
    let mut backoff = initial_backoff;
    let mut attempt = 1;
    loop {
        match Client::try_default().await {
            Ok(client) => return Ok(client),
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "kubernetes client unavailable, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

/// The waiting reason if the connector image cannot be pulled.
fn image_pull_failure(pod: &Pod) -> Option<String> {
    let statuses = pod.status.as_ref()?.container_statuses.as_ref()?;
    statuses.iter().find_map(|status| {
        let waiting = status.state.as_ref()?.waiting.as_ref()?;
        let reason = waiting.reason.as_deref()?;
        IMAGE_PULL_FAILURES.contains(&reason).then(|| match waiting.message.as_deref() {
            Some(message) => format!("{}: {}", reason, message),
            None => reason.to_string(),
        })
    })
}

/// Result channel from the pod's operation-type annotation.
fn result_source(pod: &Pod, output_file: Option<&str>) -> ResultSource {
    let operation = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(pod::OPERATION_TYPE_ANNOTATION))
        .and_then(|op| Command::parse(op));
    if operation.is_none() {
        tracing::warn!(
            pod_name = pod.metadata.name.as_deref().unwrap_or_default(),
            "pod has no operation-type annotation, parsing logs"
        );
    }
    ResultSource::for_operation(operation, output_file)
}

/// Delete a pod, logging failures. Returns whether the pod is gone.
async fn delete_pod(pods: &Api<Pod>, pod_name: &str) -> bool {
    match pods.delete(pod_name, &DeleteParams::default()).await {
        Ok(_) => {
            tracing::debug!(%pod_name, "deleted connector pod");
            true
        }
        Err(kube::Error::Api(e)) if e.code == 404 => true,
        Err(e) => {
            tracing::warn!(%pod_name, error = %e, "failed to delete connector pod");
            false
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
