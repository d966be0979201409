// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! olake-worker: runs OLake sync workflows on Docker or Kubernetes.

use olake_worker::lifecycle::{self, Config, LifecycleError};
use olake_worker::{env, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("olake-worker: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), LifecycleError> {
    let config = Config::load()?;
    let _log_guard = logging::init_logging(&config.log_dir, &env::log_filter())?;
    info!(
        version = env::PROTOCOL_VERSION,
        executor = ?config.executor,
        state_dir = %config.state_dir.display(),
        "starting olake-worker"
    );

    let state = match lifecycle::startup(&config).await {
        Ok(state) => state,
        Err(e) => {
            error!("startup failed: {}", e);
            return Err(e);
        }
    };

    let stop_requested = state.stop_requested.clone();
    tokio::select! {
        _ = stop_requested.notified() => info!("shutdown requested by client"),
        _ = terminate() => info!("received termination signal"),
    }
    state.shutdown().await
}

/// Resolves on SIGINT or SIGTERM.
async fn terminate() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("cannot listen for SIGTERM: {}", e);
            let _ = ctrl_c.await;
            return;
        }
    };
    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm.recv() => {}
    }
}
