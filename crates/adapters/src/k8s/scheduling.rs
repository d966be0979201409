// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job→node scheduling policy.
//!
//! Operators map job ids to node labels. Each entry is validated on load;
//! invalid entries are skipped and reported, never applied. A load that
//! yields nothing usable from a non-empty source keeps serving the last
//! known-good mapping.
//!
//! The worker loads `OLAKE_K8S_JOB_MAPPING` at startup and replaces the
//! mapping in place on each `ReloadJobMapping` request.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, NodeAffinity, NodeSelectorRequirement, NodeSelectorTerm, PodAffinityTerm,
    PodAntiAffinity, PreferredSchedulingTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use olake_core::{Command, JobId};
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

use super::labels::{validate_key, validate_value};
use super::pod::OPERATION_TYPE_LABEL;

/// Node-selector labels for one job.
pub type NodeLabels = BTreeMap<String, String>;

/// Weight of the preferred node-affinity term.
pub const NODE_AFFINITY_WEIGHT: i32 = 100;

/// Topology key spreading concurrent syncs across nodes.
pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// A rejected job mapping entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("job mapping is not a JSON object: {0}")]
    Json(String),
    #[error("job id {0:?} is not a positive integer")]
    InvalidJobId(String),
    #[error("job {0}: mapping is null")]
    NullMapping(i64),
    #[error("job {job}: mapping must be an object of string labels")]
    Malformed { job: i64 },
    #[error("job {job}: invalid label key {key:?}: {reason}")]
    InvalidKey { job: i64, key: String, reason: String },
    #[error("job {job}: invalid value for label {key:?}: {reason}")]
    InvalidValue { job: i64, key: String, reason: String },
}

/// Outcome of one mapping load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries now in effect from this load
    pub valid: usize,
    /// Entries skipped
    pub invalid: usize,
    pub errors: Vec<MappingError>,
    /// True when nothing validated and the last known-good mapping was kept
    pub used_fallback: bool,
}

enum RawEntry {
    Labels(NodeLabels),
    Null,
    Malformed,
}

#[derive(Default)]
struct MappingState {
    current: BTreeMap<JobId, NodeLabels>,
    last_known_good: BTreeMap<JobId, NodeLabels>,
}

/// Validated job→node mapping with a last known-good fallback.
#[derive(Default)]
pub struct JobMappingPolicy {
    state: RwLock<MappingState>,
}

impl JobMappingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mapping from already-decoded entries.
    pub fn load(&self, source: BTreeMap<String, Option<NodeLabels>>) -> LoadReport {
        let entries = source
            .into_iter()
            .map(|(job, labels)| (job, labels.map_or(RawEntry::Null, RawEntry::Labels)))
            .collect();
        self.apply(entries)
    }

    /// Replace the mapping from JSON text: `{"<job id>": {label: value} | null}`.
    ///
    /// Only a document that is not a JSON object fails as a whole; bad
    /// entries are reported in the [`LoadReport`].
    pub fn load_json(&self, raw: &str) -> Result<LoadReport, MappingError> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        let source: BTreeMap<String, Value> =
            serde_json::from_str(raw).map_err(|e| MappingError::Json(e.to_string()))?;
        let entries = source.into_iter().map(|(job, value)| (job, raw_entry(value))).collect();
        Ok(self.apply(entries))
    }

    fn apply(&self, entries: Vec<(String, RawEntry)>) -> LoadReport {
        let source_len = entries.len();
        let mut report = LoadReport::default();
        let mut valid = BTreeMap::new();

        for (job, entry) in entries {
            match validate_entry(&job, entry) {
                Ok((job_id, labels)) => {
                    valid.insert(job_id, labels);
                }
                Err(errors) => {
                    report.invalid += 1;
                    report.errors.extend(errors);
                }
            }
        }
        report.valid = valid.len();

        for error in &report.errors {
            tracing::warn!(error = %error, "skipping invalid job mapping entry");
        }

        let mut state = self.state.write();
        if source_len > 0 && valid.is_empty() {
            report.used_fallback = true;
            state.current = state.last_known_good.clone();
            tracing::warn!(
                invalid = report.invalid,
                kept = state.current.len(),
                "no valid job mapping entries, keeping last known-good mapping"
            );
        } else {
            if !valid.is_empty() {
                state.last_known_good = valid.clone();
            }
            state.current = valid;
            tracing::info!(valid = report.valid, invalid = report.invalid, "loaded job mapping");
        }
        report
    }

    /// Preferred node labels for a job; `None` when it has no preference.
    pub fn node_labels(&self, job: Option<JobId>) -> Option<NodeLabels> {
        let job = job?;
        self.state.read().current.get(&job).filter(|labels| !labels.is_empty()).cloned()
    }

    /// Number of jobs in the mapping in effect.
    pub fn len(&self) -> usize {
        self.state.read().current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn raw_entry(value: Value) -> RawEntry {
    match value {
        Value::Null => RawEntry::Null,
        Value::Object(map) => {
            let mut labels = NodeLabels::new();
            for (key, value) in map {
                match value {
                    Value::String(v) => {
                        labels.insert(key, v);
                    }
                    _ => return RawEntry::Malformed,
                }
            }
            RawEntry::Labels(labels)
        }
        _ => RawEntry::Malformed,
    }
}

/// Validate one entry, collecting every problem rather than the first.
fn validate_entry(job: &str, entry: RawEntry) -> Result<(JobId, NodeLabels), Vec<MappingError>> {
    let id = match job.trim().parse::<i64>() {
        Ok(id) if id > 0 => id,
        _ => return Err(vec![MappingError::InvalidJobId(job.to_string())]),
    };

    let labels = match entry {
        RawEntry::Labels(labels) => labels,
        RawEntry::Null => return Err(vec![MappingError::NullMapping(id)]),
        RawEntry::Malformed => return Err(vec![MappingError::Malformed { job: id }]),
    };

    let mut errors = Vec::new();
    for (key, value) in &labels {
        if let Err(reason) = validate_key(key) {
            errors.push(MappingError::InvalidKey { job: id, key: key.clone(), reason });
        }
        if let Err(reason) = validate_value(value) {
            errors.push(MappingError::InvalidValue { job: id, key: key.clone(), reason });
        }
    }
    if errors.is_empty() {
        Ok((JobId(id), labels))
    } else {
        Err(errors)
    }
}

/// Affinity for a connector pod.
///
/// Node labels become one preferred (soft) node-affinity term. Sync pods
/// also get a required anti-affinity against other sync pods on the same
/// host; short-lived operations are exempt.
pub fn build_affinity(labels: Option<&NodeLabels>, command: Command) -> Option<Affinity> {
    let node_affinity = labels.filter(|l| !l.is_empty()).map(|labels| NodeAffinity {
        preferred_during_scheduling_ignored_during_execution: Some(vec![PreferredSchedulingTerm {
            weight: NODE_AFFINITY_WEIGHT,
            preference: NodeSelectorTerm {
                match_expressions: Some(
                    labels
                        .iter()
                        .map(|(key, value)| NodeSelectorRequirement {
                            key: key.clone(),
                            operator: "In".to_string(),
                            values: Some(vec![value.clone()]),
                        })
                        .collect(),
                ),
                ..Default::default()
            },
        }]),
        ..Default::default()
    });

    let pod_anti_affinity = (command == Command::Sync).then(|| PodAntiAffinity {
        required_during_scheduling_ignored_during_execution: Some(vec![PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    OPERATION_TYPE_LABEL.to_string(),
                    Command::Sync.to_string(),
                )])),
                ..Default::default()
            }),
            topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    });

    if node_affinity.is_none() && pod_anti_affinity.is_none() {
        return None;
    }
    Some(Affinity { node_affinity, pod_anti_affinity, ..Default::default() })
}

#[cfg(test)]
#[path = "scheduling_tests.rs"]
mod tests;
