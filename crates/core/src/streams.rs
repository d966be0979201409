// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream difference between two versions of a job's streams config.
//!
//! A streams config has two halves: the per-namespace selection
//! (`selected_streams`) and the discovered stream definitions (`streams`).
//! A stream needs its destination cleared when it was selected before and
//! after, and a sync-relevant setting changed in either half.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Selection settings that change what lands in the destination.
const SELECTION_FIELDS: [&str; 4] = ["partition_regex", "normalization", "append_mode", "filter"];

/// Stream definition settings that change what lands in the destination.
const STREAM_FIELDS: [&str; 4] =
    ["sync_mode", "cursor_field", "destination_database", "destination_table"];

#[derive(Debug, Error)]
pub enum StreamsError {
    #[error("invalid streams config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid streams config: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StreamKey {
    namespace: String,
    name: String,
}

struct Catalog {
    selected: BTreeMap<StreamKey, Value>,
    streams: BTreeMap<StreamKey, Value>,
}

impl Catalog {
    fn parse(raw: &str) -> Result<Self, StreamsError> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        let root: Value = serde_json::from_str(raw)?;
        let root = root
            .as_object()
            .ok_or_else(|| StreamsError::Shape("expected a JSON object".to_string()))?;

        let mut selected = BTreeMap::new();
        if let Some(namespaces) = root.get("selected_streams").and_then(Value::as_object) {
            for (namespace, entries) in namespaces {
                let entries = entries.as_array().ok_or_else(|| {
                    StreamsError::Shape(format!("selected_streams.{namespace} is not an array"))
                })?;
                for entry in entries {
                    let name = entry.get("stream_name").and_then(Value::as_str).ok_or_else(|| {
                        StreamsError::Shape(format!("selected_streams.{namespace} entry without stream_name"))
                    })?;
                    let key = StreamKey { namespace: namespace.clone(), name: name.to_string() };
                    selected.insert(key, entry.clone());
                }
            }
        }

        let mut streams = BTreeMap::new();
        if let Some(list) = root.get("streams").and_then(Value::as_array) {
            for wrapper in list {
                let Some(stream) = wrapper.get("stream") else { continue };
                let name = stream.get("name").and_then(Value::as_str).unwrap_or_default();
                let namespace = stream.get("namespace").and_then(Value::as_str).unwrap_or_default();
                let key = StreamKey { namespace: namespace.to_string(), name: name.to_string() };
                streams.insert(key, wrapper.clone());
            }
        }

        Ok(Self { selected, streams })
    }

    fn stream_field(&self, key: &StreamKey, field: &str) -> Value {
        self.streams
            .get(key)
            .and_then(|w| w.get("stream"))
            .and_then(|s| s.get(field))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn field(value: &Value, name: &str) -> Value {
    value.get(name).cloned().unwrap_or(Value::Null)
}

/// Streams config containing only the streams whose destination data must be
/// cleared when moving from `old` to `new`.
///
/// Newly selected and deselected streams are not part of the difference.
pub fn stream_difference(old: &str, new: &str) -> Result<String, StreamsError> {
    let old = Catalog::parse(old)?;
    let new = Catalog::parse(new)?;

    let mut selected: Map<String, Value> = Map::new();
    let mut streams = Vec::new();

    for (key, entry) in &new.selected {
        let Some(previous) = old.selected.get(key) else { continue };

        let selection_changed =
            SELECTION_FIELDS.iter().any(|f| field(entry, f) != field(previous, f));
        let stream_changed = STREAM_FIELDS
            .iter()
            .any(|f| new.stream_field(key, f) != old.stream_field(key, f));
        if !selection_changed && !stream_changed {
            continue;
        }

        if let Value::Array(list) = selected
            .entry(key.namespace.clone())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            list.push(entry.clone());
        }
        if let Some(wrapper) = new.streams.get(key) {
            streams.push(wrapper.clone());
        }
    }

    let diff = json!({ "selected_streams": selected, "streams": streams });
    Ok(diff.to_string())
}

/// Whether a streams config selects no streams at all.
pub fn is_empty_selection(raw: &str) -> Result<bool, StreamsError> {
    Ok(Catalog::parse(raw)?.selected.is_empty())
}

#[cfg(test)]
#[path = "streams_tests.rs"]
mod tests;
