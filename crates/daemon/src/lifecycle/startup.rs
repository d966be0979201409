// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker startup and initialization logic.

use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use olake_adapters::ExecutionBackend;
use olake_engine::{JobService, LocalEngine, Worker, WorkflowEngine};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{select_backend, Config, DaemonState, LifecycleError};
use crate::listener::{ListenCtx, Listener};
use crate::storage::FileJobStore;

/// Start the worker with the backend named in `config`.
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    let backend = select_backend(config).await?;
    startup_with_backend(config, Arc::new(backend)).await
}

/// Start the worker on an already-built backend.
pub async fn startup_with_backend<B: ExecutionBackend>(
    config: &Config,
    backend: Arc<B>,
) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config, backend).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // The lock and socket belong to the running worker.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner<B: ExecutionBackend>(
    config: &Config,
    backend: Arc<B>,
) -> Result<DaemonState, LifecycleError> {
    // 1. State directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST. Opened without truncation so a failed
    // attempt does not wipe the running worker's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Job rows
    let jobs = Arc::new(FileJobStore::open(&config.jobs_path)?);
    info!(jobs = jobs.len(), path = %config.jobs_path.display(), "loaded job store");

    // 4. Leftovers from a previous worker
    match backend.cleanup_stale().await {
        Ok(0) => {}
        Ok(removed) => info!(backend = backend.name(), removed, "removed stale executions"),
        Err(e) => warn!(backend = backend.name(), error = %e, "stale execution cleanup failed"),
    }

    // 5. Engine, service and the worker on its task queue
    let engine = LocalEngine::new();
    engine.set_retention(config.run_retention);
    let service = Arc::new(JobService::new(Arc::new(engine.clone()), Arc::clone(&jobs), config.service_config()));
    let mapping = backend.job_mapping();
    let worker = Worker::new(backend, Arc::clone(&jobs), service.schedules().clone(), config.worker.clone());
    engine.register_worker(&config.task_queue, Arc::new(worker));

    // 6. Schedules live in memory; reinstall one per stored job
    let mut restored = 0;
    for job in jobs.jobs() {
        match service.schedules().create_schedule(&job).await {
            Ok(_) => restored += 1,
            Err(e) => warn!(job_id = %job.job_id, error = %e, "could not restore schedule"),
        }
    }
    info!(restored, task_queue = %config.task_queue, "schedules restored");

    // 7. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let unix = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 8. Background tasks
    let shutdown = CancellationToken::new();
    let stop_requested = Arc::new(Notify::new());

    let scheduler = {
        let engine = engine.clone();
        let token = shutdown.clone();
        let tick = config.scheduler_tick;
        tokio::spawn(async move { engine.run_scheduler(tick, token).await })
    };
    let ctx = Arc::new(ListenCtx {
        service: Arc::clone(&service),
        shutdown: Arc::clone(&stop_requested),
        ipc_timeout: config.ipc_timeout,
        mapping,
    });
    let listener = tokio::spawn(Listener::new(unix, ctx).run(shutdown.clone()));

    info!(socket = %config.socket_path.display(), "worker started");
    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        engine,
        service,
        shutdown,
        stop_requested,
        tasks: vec![scheduler, listener],
    })
}

/// Remove files created by a failed startup.
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.lock_path] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), "failed to clean up after startup failure: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
