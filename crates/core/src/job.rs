// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job data as handed to the orchestrator by the CRUD layer.

use serde::{Deserialize, Serialize};

use crate::{JobId, ProjectId};

/// A source or destination connector as referenced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRef {
    /// Connector type, e.g. `postgres` or `iceberg`
    pub connector_type: String,
    /// Connector image tag, e.g. `v0.2.1`
    pub version: String,
    /// Decrypted connector config (JSON text)
    pub config: String,
}

impl ConnectorRef {
    pub fn new(
        connector_type: impl Into<String>,
        version: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self { connector_type: connector_type.into(), version: version.into(), config: config.into() }
    }
}

/// Everything the orchestrator needs to schedule and run one job.
///
/// Owned by the CRUD layer. The orchestrator only writes back
/// `state` and `active` through the job data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    pub project_id: ProjectId,
    pub job_id: JobId,
    pub name: String,
    pub source: ConnectorRef,
    pub destination: ConnectorRef,
    /// Human frequency string or cron expression
    pub frequency: String,
    /// Streams (catalog) config, JSON text
    pub streams_config: String,
    /// Last checkpoint state, opaque JSON text
    pub state: String,
    pub active: bool,
    /// Prefix applied to destination database names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_database_prefix: Option<String>,
}

crate::builder! {
    pub struct JobDataBuilder => JobData {
        into {
            project_id: ProjectId = "project",
            name: String = "orders-sync",
            frequency: String = "*/15 * * * *",
            streams_config: String = "{}",
            state: String = "{}",
        }
        set {
            job_id: JobId = JobId(1),
            source: ConnectorRef = ConnectorRef::new("postgres", "v0.2.1", r#"{"host":"db"}"#),
            destination: ConnectorRef = ConnectorRef::new("iceberg", "v0.2.1", r#"{"catalog":"glue"}"#),
            active: bool = true,
        }
        option {
            destination_database_prefix: String = None,
        }
    }
}
