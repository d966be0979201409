// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration specs
//!
//! Scheduled syncs, cancellation, clear-destination and the interactive
//! connector workflows, driven through the job service.

use std::time::Duration;

use olake_core::{workflow_and_schedule_id, workflow_id_range};
use olake_engine::WorkflowInput;
use serde_json::json;

use crate::prelude::*;

const QUARTER_HOUR: Duration = Duration::from_secs(15 * 60);

#[tokio::test]
async fn scheduled_sync_runs_on_cron_and_saves_state() {
    let world = World::new();
    world.backend.push_result(Command::Sync, result(&[("lsn", json!("0/16"))]));
    world.service.create_job(job(1)).await.unwrap();

    assert!(world.tick(Duration::from_secs(60)).is_empty());
    let runs = world.tick(QUARTER_HOUR);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].workflow_id.as_str(), "sync-project-1-2026-01-01T00:15:00.000Z");

    let status = world.engine.wait_for_terminal(&runs[0], SPEC_WAIT).await.unwrap();
    assert_eq!(status, WorkflowStatus::Completed);

    let saved = world.jobs.get_job_data(JobId(1)).await.unwrap();
    let state: serde_json::Value = serde_json::from_str(&saved.state).unwrap();
    assert_eq!(state, json!({"lsn": "0/16"}));
    assert!(saved.active);

    let sync = &world.backend.requests_for(Command::Sync)[0];
    assert_eq!(sync.connector_type, "postgres");
    assert_eq!(sync.job_id, Some(JobId(1)));
}

#[tokio::test]
async fn inactive_job_waits_for_activation_without_catch_up() {
    let world = World::new();
    let mut inactive = job(1);
    inactive.active = false;
    world.service.create_job(inactive).await.unwrap();

    assert!(world.tick(Duration::from_secs(60 * 60)).is_empty());

    world.service.activate_job(&project(), JobId(1), true).await.unwrap();
    assert!(world.jobs.get_job_data(JobId(1)).await.unwrap().active);
    // Ticks missed while paused are not replayed.
    assert!(world.engine.fire_due().is_empty());
    assert_eq!(world.tick(QUARTER_HOUR).len(), 1);
}

#[tokio::test]
async fn overlapping_tick_is_skipped_while_sync_runs() {
    let world = World::new();
    world.backend.hold(Command::Sync);
    world.service.create_job(job(1)).await.unwrap();

    let first = world.tick(QUARTER_HOUR);
    assert_eq!(first.len(), 1);
    assert!(world.backend.wait_for_requests(Command::Sync, 1).await);
    assert!(world.tick(QUARTER_HOUR).is_empty());

    // A manual trigger is skipped the same way.
    assert!(world.service.sync_job(&project(), JobId(1)).await.unwrap().is_none());

    world.backend.release(Command::Sync);
    world.engine.wait_for_terminal(&first[0], SPEC_WAIT).await.unwrap();
    assert_eq!(world.tick(QUARTER_HOUR).len(), 1);
}

#[tokio::test]
async fn cancel_reports_how_many_runs_stopped() {
    let world = World::new();
    world.service.create_job(job(1)).await.unwrap();
    assert_eq!(world.service.cancel_job_run(&project(), JobId(1)).await.unwrap(), 0);

    world.backend.hold(Command::Sync);
    let run = world.service.sync_job(&project(), JobId(1)).await.unwrap().unwrap();
    assert!(world.backend.wait_for_requests(Command::Sync, 1).await);

    assert_eq!(world.service.cancel_job_run(&project(), JobId(1)).await.unwrap(), 1);
    let status = world.engine.wait_for_terminal(&run, SPEC_WAIT).await.unwrap();
    assert_eq!(status, WorkflowStatus::Canceled);
}

#[tokio::test]
async fn clear_destination_waits_for_sync_then_restores_schedule() {
    let world = World::new();
    world.service.create_job(job(1)).await.unwrap();
    let streams = users_streams("full_refresh");

    // A sync that will not stop in time aborts the clear and resumes the schedule.
    world.backend.hold(Command::Sync);
    let sync = world.service.sync_job(&project(), JobId(1)).await.unwrap().unwrap();
    assert!(world.backend.wait_for_requests(Command::Sync, 1).await);
    let err = world.service.clear_destination(&project(), JobId(1), &streams).await.unwrap_err();
    assert!(matches!(err, ServiceError::SyncStillRunning { .. }), "{err}");
    let schedule = world.service.schedules().describe_schedule(&project(), JobId(1)).await.unwrap();
    assert!(!schedule.paused);

    world.backend.release(Command::Sync);
    world.engine.wait_for_terminal(&sync, SPEC_WAIT).await.unwrap();

    // Once the sync is gone the clear runs, and a sync request is refused meanwhile.
    world.clock.advance(Duration::from_secs(60));
    world.backend.hold(Command::ClearDestination);
    let clear = world.service.clear_destination(&project(), JobId(1), &streams).await.unwrap();
    assert!(world.backend.wait_for_requests(Command::ClearDestination, 1).await);
    let err = world.service.sync_job(&project(), JobId(1)).await.unwrap_err();
    assert_eq!(err.to_string(), "clear-destination in progress for job 1");

    world.backend.release(Command::ClearDestination);
    let status = world.engine.wait_for_terminal(&clear, SPEC_WAIT).await.unwrap();
    assert_eq!(status, WorkflowStatus::Completed);

    let service = &world.service;
    let restored = world
        .eventually(move || async move {
            let schedule = service.schedules().describe_schedule(&project(), JobId(1)).await.unwrap();
            !schedule.paused && schedule.action.input == WorkflowInput::Sync { project_id: project(), job_id: JobId(1) }
        })
        .await;
    assert!(restored, "schedule should be back on sync");

    let request = &world.backend.requests_for(Command::ClearDestination)[0];
    assert_eq!(request.args[0], "clear-destination");
}

#[tokio::test]
async fn clear_destination_needs_a_recent_connector() {
    let world = World::new();
    let mut old = job(1);
    old.source = ConnectorRef::new("postgres", "v0.1.9", "{}");
    world.service.create_job(old).await.unwrap();

    let err = world.service.clear_destination(&project(), JobId(1), "{}").await.unwrap_err();
    assert!(matches!(err, ServiceError::UnsupportedVersion { .. }), "{err}");
    assert!(world.backend.requests().is_empty());
}

#[tokio::test]
async fn deleting_a_job_stops_its_runs_and_schedule() {
    let world = World::new();
    world.service.create_job(job(1)).await.unwrap();
    world.backend.hold(Command::Sync);
    let run = world.service.sync_job(&project(), JobId(1)).await.unwrap().unwrap();
    assert!(world.backend.wait_for_requests(Command::Sync, 1).await);

    assert_eq!(world.service.delete_job(&project(), JobId(1)).await.unwrap(), 1);
    assert_eq!(world.engine.wait_for_terminal(&run, SPEC_WAIT).await.unwrap(), WorkflowStatus::Canceled);
    assert!(world.service.schedules().describe_schedule(&project(), JobId(1)).await.is_err());
    assert!(world.jobs.snapshot().is_empty());
    assert!(world.tick(QUARTER_HOUR).is_empty());
}

#[tokio::test]
async fn job_tasks_list_every_run_newest_first() {
    let world = World::new();
    world.service.create_job(job(1)).await.unwrap();

    let first = world.service.sync_job(&project(), JobId(1)).await.unwrap().unwrap();
    world.engine.wait_for_terminal(&first, SPEC_WAIT).await.unwrap();
    world.clock.advance(Duration::from_secs(60));
    world.backend.push_error(Command::Sync, ExecutionError::PodFailed { logs: "oom".to_string() });
    let second = world.service.sync_job(&project(), JobId(1)).await.unwrap().unwrap();
    world.engine.wait_for_terminal(&second, SPEC_WAIT).await.unwrap();

    let tasks = world.service.get_job_tasks(&project(), JobId(1)).await.unwrap();
    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![WorkflowStatus::Failed, WorkflowStatus::Completed]);
    assert_eq!(tasks[0].workflow_id, second.workflow_id);
    assert!(tasks.iter().all(|t| t.operation == Command::Sync && t.close_time.is_some()));
}

#[tokio::test]
async fn discover_returns_the_catalog() {
    let world = World::new();
    world.backend.push_result(Command::Discover, result(&[("streams", json!([{"name": "users"}]))]));

    let catalog = world
        .service
        .discover_streams(&project(), ConnectorRef::new("postgres", "v0.2.1", "{}"), None, Some(users_streams("cdc")))
        .await
        .unwrap();
    assert_eq!(catalog["streams"][0]["name"], "users");

    let request = &world.backend.requests_for(Command::Discover)[0];
    assert!(request.args.iter().any(|a| a == "--streams"));
    assert!(request.workflow_id.as_str().starts_with("discover-project-"));
}

#[tokio::test]
async fn failed_connection_test_surfaces_connector_logs() {
    let world = World::new();
    world.backend.push_error(Command::Check, ExecutionError::PodFailed { logs: "password rejected".to_string() });

    let err = world
        .service
        .test_connection(&project(), ConnectorRef::new("postgres", "v0.2.1", "{}"), ConnectorRole::Source)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("password rejected"), "{err}");
}

#[test]
fn workflow_and_schedule_ids_are_derived_from_project_and_job() {
    let (workflow_id, schedule_id) = workflow_and_schedule_id(&project(), JobId(7));
    assert_eq!(workflow_id.as_str(), "sync-project-7");
    assert_eq!(schedule_id.as_str(), "schedule-sync-project-7");

    let (start, end) = workflow_id_range(&project(), JobId(7));
    assert!(start.as_str() < "sync-project-7-2026-01-01T00:15:00.000Z");
    assert!("sync-project-7-2026-01-01T00:15:00.000Z" < end.as_str());
    // Job 70 shares the prefix but sorts past the range.
    assert!("sync-project-70-2026-01-01T00:15:00.000Z" > end.as_str());
}
