// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker execution backend: one local container per connector execution.
//!
//! The Docker CLI drives the container lifecycle:
//!
//! ```text
//! image inspect / pull ─▶ create ─▶ start ─▶ wait ─▶ logs ─▶ rm -f
//! ```
//!
//! The execution directory is bind-mounted from the host path of the shared
//! storage root, which differs from the worker's own path when the worker
//! itself runs in a container.

use std::path::PathBuf;
use std::process::Output;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use olake_core::{ExecutionRequest, ResultMap};
use tokio_util::sync::CancellationToken;

use crate::backend::image_name;
use crate::k8s::labels::{sanitize_label_value, sanitize_name};
use crate::k8s::pod::{MANAGED_BY, MANAGED_BY_LABEL, OPERATION_TYPE_LABEL, WORKFLOW_ID_LABEL};
use crate::result::{extract_result, ResultSource};
use crate::{ExecutionBackend, ExecutionError, WorkDir, CONTAINER_CONFIG_PATH};

/// Settings for the Docker backend.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Shared storage root as seen by the worker
    pub persistent_dir: PathBuf,
    /// The same root as seen by the Docker daemon
    pub host_persistent_dir: PathBuf,
    pub image_prefix: String,
    pub secret_key: Option<String>,
    /// Docker CLI executable
    pub docker_bin: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            persistent_dir: PathBuf::from("/tmp/olake-config"),
            host_persistent_dir: PathBuf::from("/tmp/olake-config"),
            image_prefix: "olakego/source-".to_string(),
            secret_key: None,
            docker_bin: PathBuf::from("docker"),
        }
    }
}

/// Runs connector executions as local Docker containers.
#[derive(Debug, Clone)]
pub struct DockerRunner {
    config: DockerConfig,
    workdir: WorkDir,
}

impl DockerRunner {
    pub fn new(config: DockerConfig) -> Self {
        let workdir = WorkDir::new(config.persistent_dir.clone());
        Self { config, workdir }
    }

    async fn run(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError> {
        let directory_id = request.directory_id();
        self.workdir.write_configs(&directory_id, &request.configs).await?;

        let image = image_name(&self.config.image_prefix, &request.connector_type, &request.version);
        self.ensure_image(&image).await?;

        let container = container_name(request);
        // A container left over from an earlier attempt would block the name.
        if let Err(e) = self.run_docker(&["rm", "-f", &container]).await {
            tracing::debug!(%container, error = %e, "no leftover container removed");
        }

        let args = self.create_args(request, &container, &image, &directory_id);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::info!(workflow_id = %request.workflow_id, %container, %image, "creating connector container");
        self.run_docker(&arg_refs).await.map_err(ExecutionError::Create)?;

        // From here on the container exists and must be removed on every path.
        let result = async {
            self.run_docker(&["start", &container]).await.map_err(ExecutionError::Docker)?;
            let exit_code = self.wait(&container, request.timeout, &cancel).await?;
            let logs = self.logs(&container).await;
            if exit_code != 0 {
                return Err(ExecutionError::ExitCode { code: exit_code, logs });
            }
            let source =
                ResultSource::for_operation(Some(request.command), request.output_file.as_deref());
            extract_result(&self.workdir, &directory_id, &source, &logs).await
        }
        .await;

        if let Err(e) = self.run_docker(&["rm", "-f", &container]).await {
            tracing::warn!(%container, error = %e, "failed to remove connector container");
        }
        result
    }

    /// Pull the image unless it is already present locally.
    async fn ensure_image(&self, image: &str) -> Result<(), ExecutionError> {
        if self.run_docker(&["image", "inspect", image]).await.is_ok() {
            return Ok(());
        }
        tracing::info!(%image, "pulling connector image");
        self.run_docker(&["pull", image])
            .await
            .map(|_| ())
            .map_err(|reason| ExecutionError::ImagePull { image: image.to_string(), reason })
    }

    fn create_args(
        &self,
        request: &ExecutionRequest,
        container: &str,
        image: &str,
        directory_id: &str,
    ) -> Vec<String> {
        let host_dir = self.config.host_persistent_dir.join(directory_id);
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            container.to_string(),
            "-v".to_string(),
            format!("{}:{}", host_dir.display(), CONTAINER_CONFIG_PATH),
            "-e".to_string(),
            format!("OLAKE_WORKFLOW_ID={}", request.workflow_id),
        ];
        if let Some(ref key) = self.config.secret_key {
            args.push("-e".to_string());
            args.push(format!("OLAKE_SECRET_KEY={}", key));
        }
        for (label, value) in [
            (MANAGED_BY_LABEL, MANAGED_BY.to_string()),
            (OPERATION_TYPE_LABEL, request.command.to_string()),
            (WORKFLOW_ID_LABEL, sanitize_label_value(request.workflow_id.as_str())),
        ] {
            args.push("--label".to_string());
            args.push(format!("{}={}", label, value));
        }
        args.push(image.to_string());
        args.extend(request.args.iter().cloned());
        args
    }

    /// Block on `docker wait` until the container exits, the timeout elapses
    /// or the execution is canceled. Returns the exit code.
    async fn wait(
        &self,
        container: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<i64, ExecutionError> {
        let args = ["wait", container];
        let wait = self.docker(&args);
        tokio::pin!(wait);

        let output = tokio::select! {
            output = &mut wait => output?,
            _ = cancel.cancelled() => {
                tracing::info!(%container, "execution canceled");
                return Err(ExecutionError::Canceled);
            }
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(%container, timeout_secs = timeout.as_secs(), "execution timed out");
                return Err(ExecutionError::Timeout(timeout));
            }
        };

        if !output.status.success() {
            return Err(ExecutionError::Docker(stderr_message("wait", &output)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse()
            .map_err(|_| ExecutionError::Docker(format!("unexpected docker wait output: {:?}", stdout.trim())))
    }

    /// Combined stdout and stderr of the container.
    async fn logs(&self, container: &str) -> String {
        match self.docker(&["logs", container]).await {
            Ok(output) => {
                let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    if !logs.is_empty() && !logs.ends_with('\n') {
                        logs.push('\n');
                    }
                    logs.push_str(&stderr);
                }
                logs
            }
            Err(e) => {
                tracing::warn!(%container, error = %e, "failed to fetch container logs");
                String::new()
            }
        }
    }

    async fn docker(&self, args: &[&str]) -> Result<Output, ExecutionError> {
        tokio::process::Command::new(&self.config.docker_bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecutionError::Docker(format!("failed to exec docker: {}", e)))
    }

    async fn run_docker(&self, args: &[&str]) -> Result<String, String> {
        let output = self.docker(args).await.map_err(|e| e.to_string())?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(stderr_message(args.first().unwrap_or(&""), &output))
        }
    }
}

#[async_trait]
impl ExecutionBackend for DockerRunner {
    fn name(&self) -> &'static str {
        "docker"
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
                "container execution completed"
            ),
            Err(e) => tracing::error!(
                workflow_id = %request.workflow_id,
                command = %request.command,
                elapsed_ms,
                error = %e,
                "container execution failed"
            ),
        }
        result
    }

    /// Remove exited containers left behind by a previous worker.
    async fn cleanup_stale(&self) -> Result<usize, ExecutionError> {
        let filter = format!("label={}={}", MANAGED_BY_LABEL, MANAGED_BY);
        let ids = self
            .run_docker(&["ps", "-a", "-q", "--filter", &filter, "--filter", "status=exited"])
            .await
            .map_err(ExecutionError::Docker)?;

        let mut removed = 0;
        for id in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.run_docker(&["rm", "-f", id]).await {
                Ok(_) => removed += 1,
                Err(e) => tracing::warn!(container = id, error = %e, "failed to remove stale container"),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "removed stale connector containers");
        }
        Ok(removed)
    }
}

/// Container name for an execution.
pub fn container_name(request: &ExecutionRequest) -> String {
    sanitize_name(request.workflow_id.as_str())
}

fn stderr_message(command: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("docker {} failed: {}", command, stderr.trim())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
