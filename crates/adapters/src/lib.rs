// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olake-adapters: execution backends that run connector containers
//!
//! - [`backend`]: the `ExecutionBackend` contract and its error type
//! - [`workdir`]: per-execution config directories on shared storage
//! - [`result`]: reading a connector's structured result back
//! - [`k8s`]: one pod per execution, with job→node scheduling
//! - [`docker`]: one local container per execution

pub mod backend;
pub mod docker;
pub mod k8s;
pub mod result;
pub mod workdir;

pub use backend::{ExecutionBackend, ExecutionError};
pub use docker::{DockerConfig, DockerRunner};
pub use k8s::{JobMappingPolicy, KubernetesConfig, KubernetesExecutor, LoadReport, MappingError};
pub use result::{extract_result, parse_logs, ResultSource};
pub use workdir::{WorkDir, CONTAINER_CONFIG_PATH};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBackend;
