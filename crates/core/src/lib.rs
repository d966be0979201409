// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olake-core: domain types shared by the OLake job orchestrator

pub mod macros;

pub mod clock;
pub mod command;
pub mod frequency;
pub mod id;
pub mod job;
pub mod request;
pub mod streams;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, ConnectorRole};
pub use frequency::{to_cron, FrequencyError};
pub use id::{
    directory_id, workflow_and_schedule_id, workflow_id_range, JobId, ProjectId,
    ScheduleId, WorkflowId,
};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobDataBuilder;
pub use job::{ConnectorRef, JobData};
pub use request::{ConfigFile, ExecutionRequest, ResultMap};
pub use streams::{is_empty_selection, stream_difference, StreamsError};
pub use version::{
    supports_version, ConnectorVersion, CLEAR_DESTINATION_MIN_VERSION,
    MAX_DISCOVER_THREADS_MIN_VERSION,
};
