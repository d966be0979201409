// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process specs
//!
//! Drive a started worker through its socket the way the CRUD layer does.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use olake_worker::lifecycle::{startup_with_backend, Config, ExecutorKind};
use olake_worker::protocol::{call, Request, Response};
use olake_worker::DaemonState;
use tempfile::TempDir;
use tokio::net::UnixStream;

use crate::prelude::*;

async fn start(dir: &Path, backend: Arc<FakeBackend>) -> DaemonState {
    let mut config = Config::for_state_dir(dir.to_path_buf(), ExecutorKind::Docker);
    config.scheduler_tick = Duration::from_millis(20);
    startup_with_backend(&config, backend).await.unwrap()
}

async fn send(state: &DaemonState, request: Request) -> Response {
    let mut stream = UnixStream::connect(&state.config.socket_path).await.unwrap();
    call(&mut stream, &request, SPEC_WAIT).await.unwrap()
}

#[tokio::test]
async fn jobs_and_schedules_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new());

    let state = start(dir.path(), Arc::clone(&backend)).await;
    let mut inactive = job(2);
    inactive.active = false;
    assert!(matches!(send(&state, Request::CreateJob { job: job(1) }).await, Response::ScheduleCreated { .. }));
    assert!(matches!(send(&state, Request::CreateJob { job: inactive }).await, Response::ScheduleCreated { .. }));
    state.shutdown().await.unwrap();

    let state = start(dir.path(), backend).await;
    let schedules = state.service.schedules();
    assert!(!schedules.describe_schedule(&project(), JobId(1)).await.unwrap().paused);
    assert!(schedules.describe_schedule(&project(), JobId(2)).await.unwrap().paused);

    // Creating the same job again is refused: the schedule is already back.
    assert!(matches!(send(&state, Request::CreateJob { job: job(1) }).await, Response::Error { .. }));
    state.shutdown().await.unwrap();
}

#[tokio::test]
async fn sync_over_the_socket_writes_back_state() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FakeBackend::new());
    backend.push_result(Command::Sync, result(&[("cursor", serde_json::json!(42))]));
    let state = start(dir.path(), Arc::clone(&backend)).await;

    send(&state, Request::CreateJob { job: job(1) }).await;
    let run = match send(&state, Request::SyncJob { project_id: project(), job_id: JobId(1) }).await {
        Response::Run { run: Some(run) } => run,
        other => panic!("unexpected response: {other:?}"),
    };
    let status = state.engine.wait_for_terminal(&run, SPEC_WAIT).await.unwrap();
    assert_eq!(status, WorkflowStatus::Completed);

    let stored = olake_worker::FileJobStore::open(&state.config.jobs_path).unwrap();
    let row = stored.get_job_data(JobId(1)).await.unwrap();
    assert_eq!(row.state, r#"{"cursor":42}"#);

    let response = send(&state, Request::CancelJobRun { project_id: project(), job_id: JobId(1) }).await;
    assert_eq!(response, Response::Canceled { count: 0 });
    state.shutdown().await.unwrap();
}
