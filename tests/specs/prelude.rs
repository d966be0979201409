// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for orchestration specs.
//!
//! Wires the real service, engine and worker together over a fake
//! execution backend, an in-memory job store and a controllable clock.

use std::sync::Arc;
use std::time::Duration;

pub use olake_adapters::{ExecutionError, FakeBackend};
pub use olake_core::test_support::{job, users_streams};
pub use olake_core::{Command, ConnectorRef, ConnectorRole, FakeClock, JobId, ProjectId, ResultMap};
pub use olake_engine::{
    JobDataService, JobService, LocalEngine, MemoryJobStore, ScheduleManager, ServiceConfig,
    ServiceError, Worker, WorkerConfig, WorkflowEngine, WorkflowStatus,
};

pub const QUEUE: &str = "OLAKE_DOCKER_TASK_QUEUE";

/// Upper bound for any wait in these tests
pub const SPEC_WAIT: Duration = Duration::from_secs(5);

pub struct World {
    pub backend: Arc<FakeBackend>,
    pub jobs: Arc<MemoryJobStore>,
    pub engine: Arc<LocalEngine<FakeClock>>,
    pub clock: FakeClock,
    pub service: JobService<LocalEngine<FakeClock>, MemoryJobStore>,
}

impl World {
    pub fn new() -> Self {
        let backend = Arc::new(FakeBackend::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let clock = FakeClock::new();
        let engine = Arc::new(LocalEngine::with_clock(clock.clone()));
        let worker = Worker::new(
            Arc::clone(&backend),
            Arc::clone(&jobs),
            ScheduleManager::new(Arc::clone(&engine), QUEUE),
            WorkerConfig::default(),
        );
        engine.register_worker(QUEUE, Arc::new(worker));
        let config = ServiceConfig { task_queue: QUEUE.to_string(), clear_wait_timeout: Duration::from_millis(300) };
        let service = JobService::new(Arc::clone(&engine), Arc::clone(&jobs), config);
        Self { backend, jobs, engine, clock, service }
    }

    /// Advance the clock and fire whatever schedules came due.
    pub fn tick(&self, by: Duration) -> Vec<olake_engine::RunHandle> {
        self.clock.advance(by);
        self.engine.fire_due()
    }

    /// Poll `check` until it holds or [`SPEC_WAIT`] elapses.
    pub async fn eventually<F, Fut>(&self, mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + SPEC_WAIT;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub fn project() -> ProjectId {
    ProjectId::new("project")
}

pub fn result(pairs: &[(&str, serde_json::Value)]) -> ResultMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}
