// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result extraction from connector output.
//!
//! Connectors report results either in an output file in the execution
//! directory or as JSON lines in their logs. [`ResultSource`] decides which
//! channel to read; log parsing is the fallback for everything.

use olake_core::{Command, ResultMap};
use serde_json::Value;

use crate::{ExecutionError, WorkDir};

const CONNECTION_STATUS: &str = "connectionStatus";

/// Where to read an execution's structured result from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSource {
    /// A JSON file in the execution directory
    StructuredFile(String),
    /// The captured container logs
    Logs,
}

impl ResultSource {
    /// Choose the result channel for an operation.
    ///
    /// An unknown operation (missing or unreadable pod annotation) always
    /// reads logs. Connection checks report through logs even when an output
    /// file is named.
    pub fn for_operation(operation: Option<Command>, output_file: Option<&str>) -> Self {
        match (operation, output_file) {
            (None, _) | (Some(Command::Check), _) => ResultSource::Logs,
            (Some(_), Some(file)) if !file.is_empty() => {
                ResultSource::StructuredFile(file.to_string())
            }
            (Some(_), _) => ResultSource::Logs,
        }
    }
}

/// Read the result from `source`, falling back to the logs when the output
/// file is missing or unreadable.
pub async fn extract_result(
    workdir: &WorkDir,
    directory_id: &str,
    source: &ResultSource,
    logs: &str,
) -> Result<ResultMap, ExecutionError> {
    if let ResultSource::StructuredFile(file) = source {
        match workdir.read_json(directory_id, file).await {
            Ok(Some(map)) => return Ok(map),
            Ok(None) => {
                tracing::warn!(directory_id, file = %file, "output file missing, parsing logs");
            }
            Err(e) => {
                tracing::warn!(directory_id, file = %file, error = %e, "output file unreadable, parsing logs");
            }
        }
    }
    Ok(parse_logs(logs))
}

/// Parse connector log output into a result map.
///
/// 1. Connection-test output: the last non-empty line carries
///    `{"connectionStatus": {"status", "message"}}`.
/// 2. Otherwise every JSON object found on a line is merged, later keys win.
/// 3. No JSON at all yields `{raw_output, status: "completed"}`.
pub fn parse_logs(logs: &str) -> ResultMap {
    if logs.contains(CONNECTION_STATUS) {
        if let Some(status) = parse_connection_status(logs) {
            return status;
        }
    }

    let mut merged = ResultMap::new();
    let mut found = false;
    for line in logs.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(object) = parse_line(line) {
            found = true;
            merged.extend(object);
        }
    }
    if found {
        return merged;
    }

    let mut raw = ResultMap::new();
    raw.insert("raw_output".to_string(), Value::String(logs.to_string()));
    raw.insert("status".to_string(), Value::String("completed".to_string()));
    raw
}

fn parse_connection_status(logs: &str) -> Option<ResultMap> {
    let last = logs.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let start = last.find('{')?;
    let value: Value = serde_json::from_str(&last[start..]).ok()?;
    let status = value.get(CONNECTION_STATUS)?.as_object()?;

    let mut result = ResultMap::new();
    for key in ["message", "status"] {
        let field = status.get(key).cloned().unwrap_or_else(|| Value::String(String::new()));
        result.insert(key.to_string(), field);
    }
    Some(result)
}

/// A JSON object from a whole line, or from the line's first `{` onward
/// (log prefixes such as timestamps and levels).
fn parse_line(line: &str) -> Option<ResultMap> {
    if let Ok(Value::Object(map)) = serde_json::from_str(line) {
        return Some(map);
    }
    let start = line.find('{')?;
    match serde_json::from_str(&line[start..]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
