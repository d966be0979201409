// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker crate.

use std::path::PathBuf;
use std::time::Duration;

use olake_engine::DEFAULT_RUN_RETENTION;

use crate::lifecycle::LifecycleError;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: OLAKE_STATE_DIR > XDG_STATE_HOME/olake > ~/.local/state/olake
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("OLAKE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("olake"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/olake"))
}

/// Log filter directive (`OLAKE_LOG`, default `info`)
pub fn log_filter() -> String {
    non_empty("OLAKE_LOG").unwrap_or_else(|| "info".to_string())
}

/// Execution backend name (`docker` or `kubernetes`)
pub fn executor() -> String {
    non_empty("OLAKE_EXECUTOR").unwrap_or_else(|| "docker".to_string())
}

/// Task queue override. The default depends on the backend.
pub fn task_queue() -> Option<String> {
    non_empty("OLAKE_TASK_QUEUE")
}

/// Shared storage root as seen by the worker
pub fn persistent_dir() -> PathBuf {
    non_empty("OLAKE_PERSISTENT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp/olake-config"))
}

/// Shared storage root as seen by the Docker host. Defaults to the worker's view.
pub fn host_persistent_dir() -> Option<PathBuf> {
    non_empty("OLAKE_HOST_PERSISTENT_DIR").map(PathBuf::from)
}

pub fn image_prefix() -> String {
    non_empty("OLAKE_IMAGE_PREFIX").unwrap_or_else(|| "olakego/source-".to_string())
}

pub fn secret_key() -> Option<String> {
    non_empty("OLAKE_SECRET_KEY")
}

pub fn max_discover_threads() -> Option<u32> {
    parsed("OLAKE_MAX_DISCOVER_THREADS")
}

pub fn k8s_namespace() -> String {
    non_empty("OLAKE_K8S_NAMESPACE").unwrap_or_else(|| "default".to_string())
}

pub fn k8s_pvc_name() -> String {
    non_empty("OLAKE_K8S_PVC_NAME").unwrap_or_else(|| "olake-jobs-pvc".to_string())
}

/// Pod phase poll interval (default 5s)
pub fn k8s_poll_interval() -> Duration {
    parsed::<u64>("OLAKE_K8S_POLL_INTERVAL_MS").map(Duration::from_millis).unwrap_or(Duration::from_secs(5))
}

pub fn k8s_cpu_request() -> String {
    non_empty("OLAKE_K8S_CPU_REQUEST").unwrap_or_else(|| "500m".to_string())
}

pub fn k8s_memory_request() -> String {
    non_empty("OLAKE_K8S_MEMORY_REQUEST").unwrap_or_else(|| "1Gi".to_string())
}

/// Raw JSON job→node mapping
pub fn k8s_job_mapping() -> Option<String> {
    non_empty("OLAKE_K8S_JOB_MAPPING")
}

/// Worker identity recorded on pods. Falls back to the hostname.
pub fn worker_id() -> String {
    non_empty("OLAKE_WORKER_ID")
        .or_else(|| non_empty("HOSTNAME"))
        .unwrap_or_else(|| "olake-worker".to_string())
}

/// How long clear-destination waits for a running sync (default 600s)
pub fn clear_wait_timeout() -> Duration {
    parsed::<u64>("OLAKE_CLEAR_WAIT_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(Duration::from_secs(600))
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    parsed::<u64>("OLAKE_IPC_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(Duration::from_secs(5))
}

/// How often the scheduler checks for due cron ticks (default 1s)
pub fn scheduler_tick() -> Duration {
    parsed::<u64>("OLAKE_SCHEDULER_TICK_MS").map(Duration::from_millis).unwrap_or(Duration::from_secs(1))
}

/// How long finished runs stay listable (default 7 days)
pub fn run_retention() -> Duration {
    parsed::<u64>("OLAKE_RUN_RETENTION_SECS").map(Duration::from_secs).unwrap_or(DEFAULT_RUN_RETENTION)
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
