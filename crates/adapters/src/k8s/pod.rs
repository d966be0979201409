// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod spec construction for connector executions.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{
    Affinity, Container, EnvVar, PersistentVolumeClaimVolumeSource, Pod, PodSpec,
    ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use olake_core::ExecutionRequest;

use super::labels::{sanitize_label_value, sanitize_name};
use crate::CONTAINER_CONFIG_PATH;

pub const NAME_LABEL: &str = "app.kubernetes.io/name";
pub const COMPONENT_LABEL: &str = "app.kubernetes.io/component";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const OPERATION_TYPE_LABEL: &str = "olake.io/operation-type";
pub const CONNECTOR_LABEL: &str = "olake.io/connector";
pub const JOB_ID_LABEL: &str = "olake.io/job-id";
pub const WORKFLOW_ID_LABEL: &str = "olake.io/workflow-id";

pub const WORKFLOW_ID_ANNOTATION: &str = "olake.io/workflow-id";
pub const OPERATION_TYPE_ANNOTATION: &str = "olake.io/operation-type";
pub const CONNECTOR_TYPE_ANNOTATION: &str = "olake.io/connector-type";
pub const JOB_ID_ANNOTATION: &str = "olake.io/job-id";
pub const CREATED_AT_ANNOTATION: &str = "olake.io/created-at";
pub const CREATED_BY_ANNOTATION: &str = "olake.io/created-by-worker";

pub const APP_NAME: &str = "olake";
pub const MANAGED_BY: &str = "olake-worker";

const CONTAINER_NAME: &str = "connector";
const VOLUME_NAME: &str = "shared-storage";

/// Parameters for building a connector pod.
pub(super) struct PodParams<'a> {
    pub request: &'a ExecutionRequest,
    pub image: String,
    pub namespace: String,
    pub pvc_name: String,
    pub directory_id: String,
    pub secret_key: Option<String>,
    pub worker_id: String,
    pub cpu_request: String,
    pub memory_request: String,
    pub affinity: Option<Affinity>,
    pub created_at: DateTime<Utc>,
}

/// Deterministic pod name for a workflow id.
pub fn pod_name(request: &ExecutionRequest) -> String {
    sanitize_name(request.workflow_id.as_str())
}

/// Build the pod for one execution.
pub(super) fn build_pod(params: &PodParams<'_>) -> Pod {
    let request = params.request;
    let operation = request.command.to_string();

    let mut labels = BTreeMap::from([
        (NAME_LABEL.to_string(), APP_NAME.to_string()),
        (COMPONENT_LABEL.to_string(), CONTAINER_NAME.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (OPERATION_TYPE_LABEL.to_string(), operation.clone()),
        (CONNECTOR_LABEL.to_string(), sanitize_label_value(&request.connector_type)),
        (WORKFLOW_ID_LABEL.to_string(), sanitize_label_value(request.workflow_id.as_str())),
    ]);

    let mut annotations = BTreeMap::from([
        (WORKFLOW_ID_ANNOTATION.to_string(), request.workflow_id.to_string()),
        (OPERATION_TYPE_ANNOTATION.to_string(), operation),
        (CONNECTOR_TYPE_ANNOTATION.to_string(), request.connector_type.clone()),
        (
            CREATED_AT_ANNOTATION.to_string(),
            params.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        (CREATED_BY_ANNOTATION.to_string(), params.worker_id.clone()),
    ]);

    if let Some(job_id) = request.job_id {
        labels.insert(JOB_ID_LABEL.to_string(), job_id.to_string());
        annotations.insert(JOB_ID_ANNOTATION.to_string(), job_id.to_string());
    }

    let mut env = vec![env_var("OLAKE_WORKFLOW_ID", request.workflow_id.as_str())];
    if let Some(ref key) = params.secret_key {
        env.push(env_var("OLAKE_SECRET_KEY", key));
    }

    // Requests only: limits throttle multi-day syncs.
    let requests = BTreeMap::from([
        ("cpu".to_string(), Quantity(params.cpu_request.clone())),
        ("memory".to_string(), Quantity(params.memory_request.clone())),
    ]);

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(params.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        args: Some(request.args.clone()),
        env: Some(env),
        volume_mounts: Some(vec![VolumeMount {
            name: VOLUME_NAME.to_string(),
            mount_path: CONTAINER_CONFIG_PATH.to_string(),
            sub_path: Some(params.directory_id.clone()),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements { requests: Some(requests), ..Default::default() }),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(pod_name(request)),
            namespace: Some(params.namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            volumes: Some(vec![Volume {
                name: VOLUME_NAME.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: params.pvc_name.clone(),
                    read_only: None,
                }),
                ..Default::default()
            }]),
            affinity: params.affinity.clone(),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
