// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle: configuration, startup, shutdown.

mod backend;
mod startup;

pub use backend::{select_backend, Backend};
pub use startup::{startup, startup_with_backend};

use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use olake_adapters::{DockerConfig, KubernetesConfig, MappingError};
use olake_engine::{
    JobService, LocalEngine, ServiceConfig, WorkerConfig, DEFAULT_RUN_RETENTION, DOCKER_TASK_QUEUE,
    K8S_TASK_QUEUE,
};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::env;
use crate::storage::{FileJobStore, StorageError};

/// The service the listener exposes.
pub type Service = JobService<LocalEngine, FileJobStore>;

/// Which execution backend runs connector containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Docker,
    Kubernetes,
}

impl ExecutorKind {
    pub fn default_task_queue(self) -> &'static str {
        match self {
            ExecutorKind::Docker => DOCKER_TASK_QUEUE,
            ExecutorKind::Kubernetes => K8S_TASK_QUEUE,
        }
    }
}

impl FromStr for ExecutorKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(ExecutorKind::Docker),
            "kubernetes" | "k8s" => Ok(ExecutorKind::Kubernetes),
            other => Err(LifecycleError::InvalidConfig(format!("unknown executor {other:?}"))),
        }
    }
}

/// Worker configuration, built once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Lock file preventing two workers on one state dir
    pub lock_path: PathBuf,
    pub log_dir: PathBuf,
    /// File-backed job rows
    pub jobs_path: PathBuf,
    pub executor: ExecutorKind,
    pub task_queue: String,
    pub docker: DockerConfig,
    pub kubernetes: KubernetesConfig,
    /// Raw JSON job→node mapping
    pub job_mapping: Option<String>,
    pub worker: WorkerConfig,
    pub clear_wait_timeout: Duration,
    pub ipc_timeout: Duration,
    pub scheduler_tick: Duration,
    /// How long finished runs stay listable
    pub run_retention: Duration,
}

impl Config {
    /// Load configuration for the worker from `OLAKE_*` variables.
    pub fn load() -> Result<Self, LifecycleError> {
        let executor = env::executor().parse::<ExecutorKind>()?;
        let mut config = Self::for_state_dir(env::state_dir()?, executor);

        let persistent_dir = env::persistent_dir();
        let secret_key = env::secret_key();
        let image_prefix = env::image_prefix();

        config.docker = DockerConfig {
            host_persistent_dir: env::host_persistent_dir().unwrap_or_else(|| persistent_dir.clone()),
            persistent_dir: persistent_dir.clone(),
            image_prefix: image_prefix.clone(),
            secret_key: secret_key.clone(),
            ..DockerConfig::default()
        };
        config.kubernetes = KubernetesConfig {
            namespace: env::k8s_namespace(),
            pvc_name: env::k8s_pvc_name(),
            persistent_dir,
            image_prefix,
            secret_key: secret_key.clone(),
            worker_id: env::worker_id(),
            poll_interval: env::k8s_poll_interval(),
            cpu_request: env::k8s_cpu_request(),
            memory_request: env::k8s_memory_request(),
        };
        config.job_mapping = env::k8s_job_mapping();
        config.worker = WorkerConfig {
            secret_key,
            max_discover_threads: env::max_discover_threads(),
            ..WorkerConfig::default()
        };
        if let Some(queue) = env::task_queue() {
            config.task_queue = queue;
        }
        config.clear_wait_timeout = env::clear_wait_timeout();
        config.ipc_timeout = env::ipc_timeout();
        config.scheduler_tick = env::scheduler_tick();
        config.run_retention = env::run_retention();
        Ok(config)
    }

    /// Paths under `state_dir` and defaults for everything else.
    pub fn for_state_dir(state_dir: PathBuf, executor: ExecutorKind) -> Self {
        Self {
            socket_path: state_dir.join("worker.sock"),
            lock_path: state_dir.join("worker.pid"),
            log_dir: state_dir.join("logs"),
            jobs_path: state_dir.join("jobs.json"),
            state_dir,
            executor,
            task_queue: executor.default_task_queue().to_string(),
            docker: DockerConfig::default(),
            kubernetes: KubernetesConfig::default(),
            job_mapping: None,
            worker: WorkerConfig::default(),
            clear_wait_timeout: Duration::from_secs(600),
            ipc_timeout: Duration::from_secs(5),
            scheduler_tick: Duration::from_secs(1),
            run_retention: DEFAULT_RUN_RETENTION,
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig { task_queue: self.task_queue.clone(), clear_wait_timeout: self.clear_wait_timeout }
    }
}

/// A running worker.
pub struct DaemonState {
    pub config: Config,
    // Held for its lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub engine: LocalEngine,
    pub service: Arc<Service>,
    /// Cancelled to stop the scheduler and listener tasks
    pub shutdown: CancellationToken,
    /// Notified when a client sends `Shutdown`
    pub stop_requested: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
}

impl DaemonState {
    /// Stop background tasks and remove the socket and lock files.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down worker...");
        self.shutdown.cancel();

        let canceled = self.engine.cancel_all();
        if canceled > 0 {
            info!(canceled, "canceled running workflows");
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("background task ended abnormally: {}", e);
            }
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Worker shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: worker already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("job mapping: {0}")]
    Mapping(#[from] MappingError),

    #[error("kubernetes client: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("job store: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
