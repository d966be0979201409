// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake execution backend for testing

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use olake_core::{Command, ExecutionRequest, ResultMap};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{ExecutionBackend, ExecutionError, JobMappingPolicy};

#[derive(Default)]
struct FakeState {
    requests: Vec<ExecutionRequest>,
    scripted: HashMap<Command, VecDeque<Result<ResultMap, ExecutionError>>>,
    held: HashSet<Command>,
    cleanups: usize,
}

/// Execution backend that records requests and replays scripted results.
///
/// Unscripted executions succeed with `{"status": "completed"}`. A held
/// command blocks until released or canceled, which lets tests observe a
/// workflow while it is running.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    release: Arc<watch::Sender<u64>>,
    mapping: Option<Arc<JobMappingPolicy>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        let (release, _) = watch::channel(0);
        Self { state: Arc::new(Mutex::new(FakeState::default())), release: Arc::new(release), mapping: None }
    }

    /// Report `mapping` as this backend's job→node mapping.
    pub fn with_job_mapping(mut self, mapping: Arc<JobMappingPolicy>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Queue a successful result for the next execution of `command`.
    pub fn push_result(&self, command: Command, result: ResultMap) {
        self.state.lock().scripted.entry(command).or_default().push_back(Ok(result));
    }

    /// Queue a failure for the next execution of `command`.
    pub fn push_error(&self, command: Command, error: ExecutionError) {
        self.state.lock().scripted.entry(command).or_default().push_back(Err(error));
    }

    /// Block executions of `command` until [`FakeBackend::release`].
    pub fn hold(&self, command: Command) {
        self.state.lock().held.insert(command);
    }

    pub fn release(&self, command: Command) {
        self.state.lock().held.remove(&command);
        self.release.send_modify(|generation| *generation += 1);
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.state.lock().requests.clone()
    }

    pub fn requests_for(&self, command: Command) -> Vec<ExecutionRequest> {
        self.state.lock().requests.iter().filter(|r| r.command == command).cloned().collect()
    }

    pub fn cleanups(&self) -> usize {
        self.state.lock().cleanups
    }

    /// Wait until `count` executions of `command` have started.
    pub async fn wait_for_requests(&self, command: Command, count: usize) -> bool {
        for _ in 0..500 {
            if self.requests_for(command).len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn is_held(&self, command: Command) -> bool {
        self.state.lock().held.contains(&command)
    }
}

#[async_trait]
impl ExecutionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ResultMap, ExecutionError> {
        let mut released = self.release.subscribe();
        self.state.lock().requests.push(request.clone());

        while self.is_held(request.command) {
            tokio::select! {
                changed = released.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => return Err(ExecutionError::Canceled),
            }
        }
        if cancel.is_cancelled() {
            return Err(ExecutionError::Canceled);
        }

        let scripted = self.state.lock().scripted.get_mut(&request.command).and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            let mut result = ResultMap::new();
            result.insert("status".to_string(), "completed".into());
            Ok(result)
        })
    }

    async fn cleanup_stale(&self) -> Result<usize, ExecutionError> {
        self.state.lock().cleanups += 1;
        Ok(0)
    }

    fn job_mapping(&self) -> Option<Arc<JobMappingPolicy>> {
        self.mapping.clone()
    }
}
