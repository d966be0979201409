// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch over a real socket against a worker on a fake backend.

use olake_adapters::{ExecutionError, FakeBackend, JobMappingPolicy};
use olake_core::test_support::{job, users_streams};
use olake_core::{Command, ConnectorRef, ConnectorRole, JobId, ProjectId, ResultMap};
use olake_engine::WorkflowEngine;
use tempfile::TempDir;
use tokio::net::UnixStream;

use super::*;
use crate::lifecycle::{startup_with_backend, Config, DaemonState, ExecutorKind};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    _dir: TempDir,
    state: DaemonState,
    backend: Arc<FakeBackend>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_backend(FakeBackend::new()).await
    }

    async fn with_backend(backend: FakeBackend) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::for_state_dir(dir.path().to_path_buf(), ExecutorKind::Docker);
        config.scheduler_tick = Duration::from_millis(20);
        let backend = Arc::new(backend);
        let state = startup_with_backend(&config, Arc::clone(&backend)).await.unwrap();
        Self { _dir: dir, state, backend }
    }

    async fn call(&self, request: Request) -> Response {
        let mut stream = UnixStream::connect(&self.state.config.socket_path).await.unwrap();
        protocol::call(&mut stream, &request, TIMEOUT).await.unwrap()
    }
}

fn project() -> ProjectId {
    ProjectId::new("project")
}

#[tokio::test]
async fn ping_reports_version() {
    let h = Harness::new().await;
    assert_eq!(h.call(Request::Ping).await, Response::Pong { version: PROTOCOL_VERSION.to_string() });
}

#[tokio::test]
async fn create_then_sync_runs_the_job() {
    let h = Harness::new().await;
    let created = h.call(Request::CreateJob { job: job(1) }).await;
    assert!(matches!(created, Response::ScheduleCreated { ref schedule_id } if schedule_id.as_str() == "schedule-sync-project-1"));

    let run = match h.call(Request::SyncJob { project_id: project(), job_id: JobId(1) }).await {
        Response::Run { run: Some(run) } => run,
        other => panic!("unexpected response: {other:?}"),
    };
    assert!(run.workflow_id.as_str().starts_with("sync-project-1"));
    assert!(h.backend.wait_for_requests(Command::Sync, 1).await);

    let engine = h.state.engine.clone();
    engine.wait_for_terminal(&run, TIMEOUT).await.unwrap();
    match h.call(Request::JobTasks { project_id: project(), job_id: JobId(1) }).await {
        Response::JobTasks { tasks } => {
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].operation, Command::Sync);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn service_errors_become_error_responses() {
    let h = Harness::new().await;
    match h.call(Request::ActivateJob { project_id: project(), job_id: JobId(42), active: true }).await {
        Response::Error { message } => assert!(message.contains("42"), "{message}"),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn cancel_with_nothing_running_cancels_zero() {
    let h = Harness::new().await;
    h.call(Request::CreateJob { job: job(1) }).await;
    let response = h.call(Request::CancelJobRun { project_id: project(), job_id: JobId(1) }).await;
    assert_eq!(response, Response::Canceled { count: 0 });
}

#[tokio::test]
async fn test_connection_returns_connector_output() {
    let h = Harness::new().await;
    let mut output = ResultMap::new();
    output.insert("connectionStatus".to_string(), serde_json::json!({"status": "SUCCEEDED"}));
    h.backend.push_result(Command::Check, output.clone());

    let response = h
        .call(Request::TestConnection {
            project_id: project(),
            connector: ConnectorRef::new("postgres", "v0.2.1", "{}"),
            role: ConnectorRole::Source,
        })
        .await;
    assert_eq!(response, Response::Output { result: output });
}

#[tokio::test]
async fn failed_discover_reports_the_execution_error() {
    let h = Harness::new().await;
    h.backend.push_error(Command::Discover, ExecutionError::PodFailed { logs: "auth failed".to_string() });

    let response = h
        .call(Request::Discover {
            project_id: project(),
            connector: ConnectorRef::new("postgres", "v0.2.1", "{}"),
            job_id: None,
            streams_config: None,
        })
        .await;
    match response {
        Response::Error { message } => assert!(message.contains("auth failed"), "{message}"),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn stream_difference_is_served_without_the_engine() {
    let h = Harness::new().await;
    let response = h
        .call(Request::StreamDifference { old_streams: users_streams("cdc"), new_streams: users_streams("cdc") })
        .await;
    assert!(matches!(response, Response::StreamDifference { .. }));

    let response =
        h.call(Request::StreamDifference { old_streams: "nope".to_string(), new_streams: "{}".to_string() }).await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn shutdown_request_notifies_the_worker() {
    let h = Harness::new().await;
    let notified = h.state.stop_requested.clone();
    let wait = tokio::spawn(async move { notified.notified().await });

    assert_eq!(h.call(Request::Shutdown).await, Response::ShuttingDown);
    tokio::time::timeout(TIMEOUT, wait).await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_connection_without_request_is_harmless() {
    let h = Harness::new().await;
    drop(UnixStream::connect(&h.state.config.socket_path).await.unwrap());
    assert!(matches!(h.call(Request::Ping).await, Response::Pong { .. }));
}

#[tokio::test]
async fn reload_replaces_mapping_and_keeps_last_good_on_bad_input() {
    let policy = Arc::new(JobMappingPolicy::new());
    let h = Harness::with_backend(FakeBackend::new().with_job_mapping(Arc::clone(&policy))).await;

    let loaded = h.call(Request::ReloadJobMapping { mapping: r#"{"5": {"disktype": "ssd"}}"#.to_string() }).await;
    assert_eq!(loaded, Response::MappingLoaded { valid: 1, invalid: 0, used_fallback: false, errors: vec![] });
    assert_eq!(policy.node_labels(Some(JobId(5))).unwrap()["disktype"], "ssd");

    let rejected = h.call(Request::ReloadJobMapping { mapping: r#"{"5": null, "0": {"a": "b"}}"#.to_string() }).await;
    match rejected {
        Response::MappingLoaded { valid: 0, invalid: 2, used_fallback: true, errors } => assert_eq!(errors.len(), 2),
        other => panic!("unexpected response: {other:?}"),
    }
    assert_eq!(policy.node_labels(Some(JobId(5))).unwrap()["disktype"], "ssd", "last known-good mapping stays");

    let cleared = h.call(Request::ReloadJobMapping { mapping: "{}".to_string() }).await;
    assert!(matches!(cleared, Response::MappingLoaded { valid: 0, used_fallback: false, .. }));
    assert_eq!(policy.node_labels(Some(JobId(5))), None);

    let malformed = h.call(Request::ReloadJobMapping { mapping: "[1]".to_string() }).await;
    assert!(matches!(malformed, Response::Error { .. }));
}

#[tokio::test]
async fn reload_without_mapping_backend_is_an_error() {
    let h = Harness::new().await;
    let response = h.call(Request::ReloadJobMapping { mapping: "{}".to_string() }).await;
    match response {
        Response::Error { message } => assert!(message.contains("kubernetes"), "{message}"),
        other => panic!("unexpected response: {other:?}"),
    }
}
