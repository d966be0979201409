// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers for jobs, workflows and schedules.
//!
//! Workflow and schedule ids are pure functions of `(project, job)`:
//!
//! ```text
//! workflow id   sync-{project}-{job}
//! schedule id   schedule-sync-{project}-{job}
//! scheduled run sync-{project}-{job}-{fire time}
//! ```
//!
//! Every run started by a job's schedule therefore sorts inside the lexical
//! range `[sync-{project}-{job}, sync-{project}-{job}-~)`, which is how
//! in-flight executions are found without a persisted index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Command;

/// Define a string-backed identifier newtype around `SmolStr`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<&str>`, `From<String>`,
/// `AsRef<str>`, `Borrow<str>`, `PartialEq<str>` and `Deref<Target = str>`.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub smol_str::SmolStr);

        impl $name {
            pub fn new(id: impl Into<smol_str::SmolStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Project that owns a job (tenant scope).
    pub struct ProjectId;
}

define_id! {
    /// Workflow identifier as known to the workflow engine.
    pub struct WorkflowId;
}

define_id! {
    /// Schedule identifier, bound 1:1 to a job.
    pub struct ScheduleId;
}

/// Numeric job identifier assigned by the CRUD layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Workflow and schedule ids for a job's recurring Sync.
pub fn workflow_and_schedule_id(project: &ProjectId, job: JobId) -> (WorkflowId, ScheduleId) {
    let workflow_id = format!("sync-{}-{}", project, job);
    let schedule_id = format!("schedule-{}", workflow_id);
    (WorkflowId::new(workflow_id), ScheduleId::new(schedule_id))
}

/// Half-open lexical range `[lo, hi)` covering every run of a job's schedule.
pub fn workflow_id_range(project: &ProjectId, job: JobId) -> (String, String) {
    let (workflow_id, _) = workflow_and_schedule_id(project, job);
    let hi = format!("{}-~", workflow_id);
    (workflow_id.0.to_string(), hi)
}

/// Working-directory name on shared storage for one execution.
///
/// Interactive commands use the workflow id verbatim. Sync and
/// ClearDestination ids live for weeks and embed job identity, so they are
/// replaced by their SHA-256 hex digest.
pub fn directory_id(workflow_id: &WorkflowId, command: Command) -> String {
    if command.is_long_running() {
        format!("{:x}", Sha256::digest(workflow_id.as_bytes()))
    } else {
        workflow_id.to_string()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
