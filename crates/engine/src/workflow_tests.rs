// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    discover = { Command::Discover, "DiscoverCatalogWorkflow", "DiscoverCatalogActivity", 10 * 60 },
    check    = { Command::Check, "TestConnectionWorkflow", "TestConnectionActivity", 5 * 60 },
    spec     = { Command::Spec, "FetchSpecWorkflow", "FetchSpecActivity", 5 * 60 },
    sync     = { Command::Sync, "RunSyncWorkflow", "SyncActivity", 30 * 24 * 60 * 60 },
    clear    = { Command::ClearDestination, "ClearDestinationWorkflow", "ClearDestinationActivity", 30 * 24 * 60 * 60 },
)]
fn registered_names_and_timeouts(command: Command, workflow: &str, activity: &str, timeout_secs: u64) {
    assert_eq!(workflow_type(command), workflow);
    assert_eq!(activity_name(command), activity);
    assert_eq!(execution_timeout(command), Duration::from_secs(timeout_secs));

    let options = activity_options(command);
    assert_eq!(options.start_to_close, execution_timeout(command));
    assert_eq!(options.retry.maximum_attempts, 1);
}

#[test]
fn no_retry_policy_allows_only_first_attempt() {
    let policy = RetryPolicy::no_retry();
    assert!(policy.allows(1));
    assert!(!policy.allows(2));
}

#[yare::parameterized(
    first  = { 1, 5 },
    second = { 2, 10 },
    third  = { 3, 20 },
    capped = { 10, 300 },
)]
fn backoff_doubles_up_to_maximum(attempt: u32, expected_secs: u64) {
    let policy = RetryPolicy { maximum_attempts: 0, ..RetryPolicy::no_retry() };
    assert!(policy.allows(attempt));
    assert_eq!(policy.backoff(attempt), Duration::from_secs(expected_secs));
}

#[test]
fn input_serializes_with_command_tag() {
    let input = WorkflowInput::ClearDestination {
        project_id: ProjectId::new("p"),
        job_id: JobId(3),
        streams_config: "{}".to_string(),
    };
    let json = serde_json::to_value(&input).unwrap();
    assert_eq!(json["command"], "clear-destination");
    assert_eq!(json["job_id"], 3);

    let back: WorkflowInput = serde_json::from_value(json).unwrap();
    assert_eq!(back, input);
    assert_eq!(back.command(), Command::ClearDestination);
    assert_eq!(back.job_id(), Some(JobId(3)));
}

#[test]
fn execution_errors_keep_timeout_and_cancel_distinct() {
    assert_eq!(WorkflowError::from(ExecutionError::Canceled), WorkflowError::Canceled);
    assert!(matches!(
        WorkflowError::from(ExecutionError::Timeout(Duration::from_secs(1))),
        WorkflowError::Timeout(_)
    ));
    assert!(matches!(
        WorkflowError::from(ExecutionError::PodFailed { logs: "oom".to_string() }),
        WorkflowError::Execution(msg) if msg == "pod failed: oom"
    ));
}
