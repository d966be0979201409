// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log setup: a daily rolling file in the state dir plus stderr.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::lifecycle::LifecycleError;

/// File name prefix of the rolling worker log
pub const LOG_FILE_PREFIX: &str = "worker.log";

/// Install the global subscriber. Keep the returned guard alive until
/// exit so buffered lines reach the file.
pub fn init_logging(log_dir: &Path, filter: &str) -> Result<WorkerGuard, LifecycleError> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(build_filter(filter))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_target(true).with_writer(file_writer))
        .try_init()
        .map_err(|e| LifecycleError::InvalidConfig(format!("logging: {e}")))?;
    Ok(guard)
}

/// Parse `directive`, falling back to `info` when it does not parse.
fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
