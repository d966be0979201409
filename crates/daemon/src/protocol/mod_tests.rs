// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serde shape of requests and responses.

use chrono::{TimeZone, Utc};
use olake_core::test_support::job;
use olake_core::{Command, WorkflowId};
use olake_engine::WorkflowStatus;
use proptest::prelude::*;

use super::*;

fn project() -> ProjectId {
    ProjectId::new("p")
}

fn connector() -> ConnectorRef {
    ConnectorRef::new("postgres", "v0.2.1", "{}")
}

fn all_requests() -> Vec<Request> {
    vec![
        Request::Ping,
        Request::Shutdown,
        Request::CreateJob { job: job(1) },
        Request::UpdateJob { job: job(2) },
        Request::DeleteJob { project_id: project(), job_id: JobId(1) },
        Request::SyncJob { project_id: project(), job_id: JobId(1) },
        Request::CancelJobRun { project_id: project(), job_id: JobId(1) },
        Request::ActivateJob { project_id: project(), job_id: JobId(1), active: false },
        Request::ClearDestination { project_id: project(), job_id: JobId(1), streams_config: "{}".into() },
        Request::StreamDifference { old_streams: "{}".into(), new_streams: "{}".into() },
        Request::JobTasks { project_id: project(), job_id: JobId(1) },
        Request::Discover { project_id: project(), connector: connector(), job_id: None, streams_config: None },
        Request::Discover {
            project_id: project(),
            connector: connector(),
            job_id: Some(JobId(4)),
            streams_config: Some("{}".into()),
        },
        Request::TestConnection { project_id: project(), connector: connector(), role: ConnectorRole::Destination },
        Request::FetchSpec { connector_type: "iceberg".into(), version: "v0.2.1".into(), role: ConnectorRole::Destination },
        Request::ReloadJobMapping { mapping: r#"{"5": {"disktype": "ssd"}}"#.into() },
    ]
}

fn all_responses() -> Vec<Response> {
    let mut result = ResultMap::new();
    result.insert("connectionStatus".into(), serde_json::json!({"status": "SUCCEEDED"}));
    vec![
        Response::Ok,
        Response::Pong { version: "0.2.0".into() },
        Response::ShuttingDown,
        Response::ScheduleCreated { schedule_id: ScheduleId::new("schedule-sync-p-1") },
        Response::Canceled { count: 2 },
        Response::Run { run: None },
        Response::Run { run: Some(RunHandle { workflow_id: WorkflowId::new("sync-p-1"), run_id: "r1".into() }) },
        Response::StreamDifference { streams: "{}".into() },
        Response::JobTasks {
            tasks: vec![JobTask {
                workflow_id: WorkflowId::new("sync-p-1"),
                run_id: "r1".into(),
                operation: Command::Sync,
                status: WorkflowStatus::Completed,
                start_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                close_time: None,
                directory_id: "abc".into(),
            }],
        },
        Response::Output { result },
        Response::MappingLoaded { valid: 0, invalid: 1, used_fallback: true, errors: vec!["job 5: mapping is null".into()] },
        Response::Error { message: "boom".into() },
    ]
}

proptest! {
    #[test]
    fn request_serde_roundtrip(req in proptest::sample::select(all_requests())) {
        let encoded = encode(&req).expect("encode");
        let decoded: Request = decode(&encoded).expect("decode");
        prop_assert_eq!(decoded, req);
    }

    #[test]
    fn response_serde_roundtrip(resp in proptest::sample::select(all_responses())) {
        let encoded = encode(&resp).expect("encode");
        let decoded: Response = decode(&encoded).expect("decode");
        prop_assert_eq!(decoded, resp);
    }
}

#[test]
fn requests_are_tagged_by_type() {
    let json = r#"{"type":"SyncJob","project_id":"p","job_id":7}"#;
    let decoded: Request = serde_json::from_str(json).expect("deserialize failed");
    assert_eq!(decoded, Request::SyncJob { project_id: project(), job_id: JobId(7) });
}

#[test]
fn discover_optional_fields_default_to_none() {
    let json = r#"{"type":"Discover","project_id":"p","connector":{"connector_type":"postgres","version":"v0.2.1","config":"{}"}}"#;
    match serde_json::from_str::<Request>(json).expect("deserialize failed") {
        Request::Discover { job_id, streams_config, .. } => {
            assert_eq!(job_id, None);
            assert_eq!(streams_config, None);
        }
        other => panic!("Expected Discover request, got {other:?}"),
    }
}
