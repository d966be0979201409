// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olake-worker: the process hosting the workflow engine, the worker and
//! the socket the CRUD layer talks to

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod protocol;
pub mod storage;

pub use lifecycle::{Config, DaemonState, ExecutorKind, LifecycleError};
pub use protocol::{Request, Response};
pub use storage::FileJobStore;
