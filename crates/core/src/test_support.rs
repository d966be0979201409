// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for tests in this and downstream crates.

use serde_json::json;

use crate::{JobData, JobId, ProjectId};

/// Streams config selecting `public.users` with the given sync mode.
pub fn users_streams(sync_mode: &str) -> String {
    json!({
        "selected_streams": {
            "public": [ { "stream_name": "users", "partition_regex": "", "normalization": false } ]
        },
        "streams": [
            { "stream": { "name": "users", "namespace": "public", "sync_mode": sync_mode } }
        ]
    })
    .to_string()
}

/// A job in project `project` with the given id and default connectors.
pub fn job(id: i64) -> JobData {
    JobData::builder()
        .project_id(ProjectId::new("project"))
        .job_id(JobId(id))
        .streams_config(users_streams("cdc"))
        .build()
}
