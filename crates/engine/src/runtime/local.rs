// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process workflow engine.
//!
//! Runs each workflow as a tokio task and keeps run history and schedules
//! in memory. Schedules fire from [`LocalEngine::fire_due`], which the
//! worker daemon drives from a ticker and tests drive with a fake clock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use olake_core::frequency::parse_cron;
use olake_core::{Clock, Command, ResultMap, ScheduleId, SystemClock, WorkflowId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{
    EngineError, ExecutionInfo, ListQuery, RunHandle, ScheduleAction, ScheduleDescription,
    ScheduleSpec, ScheduleUpdate, StartOptions, WorkflowContext, WorkflowEngine, WorkflowRunner,
    WorkflowStatus,
};
use crate::workflow::{workflow_type, WorkflowError, WorkflowInput};

/// Runs kept per schedule for overlap checks and description.
const RECENT_RUNS: usize = 10;

/// How long closed runs stay listable (7 days).
pub const DEFAULT_RUN_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

struct Execution {
    info: ExecutionInfo,
    cancel: CancellationToken,
    outcome: Option<Result<ResultMap, String>>,
    done: watch::Sender<bool>,
}

struct ScheduleEntry {
    cron: String,
    action: ScheduleAction,
    paused: bool,
    note: Option<String>,
    next_fire: Option<DateTime<Utc>>,
    recent_runs: VecDeque<RunHandle>,
}

/// A registered run waiting to be spawned.
struct Launch {
    handle: RunHandle,
    runner: Arc<dyn WorkflowRunner>,
    input: WorkflowInput,
    cancel: CancellationToken,
    task_queue: String,
    timeout: Duration,
}

struct EngineState {
    /// Keyed by run id
    executions: BTreeMap<String, Execution>,
    schedules: HashMap<ScheduleId, ScheduleEntry>,
    /// Closed runs older than this are dropped
    retention: Duration,
}

impl Default for EngineState {
    fn default() -> Self {
        Self { executions: BTreeMap::new(), schedules: HashMap::new(), retention: DEFAULT_RUN_RETENTION }
    }
}

impl EngineState {
    fn execution(&self, handle: &RunHandle) -> Result<&Execution, EngineError> {
        self.executions
            .get(&handle.run_id)
            .filter(|e| e.info.workflow_id == handle.workflow_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(handle.workflow_id.to_string()))
    }

    fn schedule_mut(&mut self, id: &ScheduleId) -> Result<&mut ScheduleEntry, EngineError> {
        self.schedules.get_mut(id).ok_or_else(|| EngineError::ScheduleNotFound(id.clone()))
    }

    fn is_running(&self, handle: &RunHandle) -> bool {
        self.executions.get(&handle.run_id).is_some_and(|e| e.info.status == WorkflowStatus::Running)
    }

    /// Drop runs that closed before `now - retention`. Running runs stay.
    fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = chrono::Duration::from_std(self.retention).ok().and_then(|r| now.checked_sub_signed(r))
        else {
            return;
        };
        let before = self.executions.len();
        self.executions.retain(|_, e| e.info.close_time.map_or(true, |closed| closed >= cutoff));
        let pruned = before - self.executions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned closed runs");
        }
    }
}

struct Inner<C: Clock> {
    clock: C,
    state: Mutex<EngineState>,
    workers: RwLock<HashMap<String, Arc<dyn WorkflowRunner>>>,
}

/// In-memory [`WorkflowEngine`].
pub struct LocalEngine<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for LocalEngine<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl LocalEngine<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LocalEngine<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LocalEngine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                state: Mutex::new(EngineState::default()),
                workers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Keep closed runs listable for `retention` after they finish.
    pub fn set_retention(&self, retention: Duration) {
        self.inner.state.lock().retention = retention;
    }

    /// Start every unpaused schedule whose next fire time has passed.
    ///
    /// Returns the runs started. A schedule whose previous run is still
    /// running skips this tick.
    pub fn fire_due(&self) -> Vec<RunHandle> {
        let now = self.inner.clock.now_utc();
        let due: Vec<(ScheduleId, DateTime<Utc>)> = {
            let mut state = self.inner.state.lock();
            state.prune(now);
            state
                .schedules
                .iter_mut()
                .filter(|(_, entry)| !entry.paused)
                .filter_map(|(id, entry)| {
                    let fire_time = entry.next_fire.filter(|t| *t <= now)?;
                    entry.next_fire = next_fire(&entry.cron, now);
                    Some((id.clone(), fire_time))
                })
                .collect()
        };

        let mut started = Vec::new();
        for (schedule_id, fire_time) in due {
            match self.start_scheduled(&schedule_id, None, fire_time) {
                Ok(Some(handle)) => started.push(handle),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(schedule_id = %schedule_id, error = %e, "scheduled run failed to start")
                }
            }
        }
        started
    }

    /// Fire due schedules every `interval` until `shutdown` is canceled.
    pub async fn run_scheduler(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.fire_due();
                }
                _ = shutdown.cancelled() => break,
            }
        }
        tracing::debug!("scheduler stopped");
    }

    /// Cancel every running workflow. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let state = self.inner.state.lock();
        let mut canceled = 0;
        for execution in state.executions.values().filter(|e| e.info.status == WorkflowStatus::Running) {
            execution.cancel.cancel();
            canceled += 1;
        }
        canceled
    }

    /// Start the schedule's current action unless its previous run is
    /// still going. The overlap check, the registration and the
    /// `recent_runs` record happen under one lock so concurrent triggers
    /// cannot both pass.
    fn start_scheduled(
        &self,
        schedule_id: &ScheduleId,
        expected: Option<Command>,
        fire_time: DateTime<Utc>,
    ) -> Result<Option<RunHandle>, EngineError> {
        let launch = {
            let mut state = self.inner.state.lock();
            let entry = state.schedule_mut(schedule_id)?;
            let action = entry.action.clone();
            let recent_runs = entry.recent_runs.clone();

            if let Some(expected) = expected {
                let actual = action.operation();
                if actual != expected {
                    return Err(EngineError::ActionMismatch { schedule_id: schedule_id.clone(), expected, actual });
                }
            }
            if recent_runs.iter().any(|h| state.is_running(h)) {
                tracing::info!(schedule_id = %schedule_id, "previous run still running, skipping");
                return Ok(None);
            }

            let workflow_id = WorkflowId::new(format!(
                "{}-{}",
                action.workflow_id,
                fire_time.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
            let options = StartOptions {
                workflow_id,
                task_queue: action.task_queue,
                execution_timeout: action.execution_timeout,
            };
            let launch = self.register(&mut state, options, action.input)?;

            let entry = state.schedule_mut(schedule_id)?;
            entry.recent_runs.push_back(launch.handle.clone());
            while entry.recent_runs.len() > RECENT_RUNS {
                entry.recent_runs.pop_front();
            }
            launch
        };
        Ok(Some(self.launch(launch)))
    }

    fn start(&self, options: StartOptions, input: WorkflowInput) -> Result<RunHandle, EngineError> {
        let launch = {
            let mut state = self.inner.state.lock();
            state.prune(self.inner.clock.now_utc());
            self.register(&mut state, options, input)?
        };
        Ok(self.launch(launch))
    }

    /// Record a new Running execution. The caller holds the state lock.
    fn register(
        &self,
        state: &mut EngineState,
        options: StartOptions,
        input: WorkflowInput,
    ) -> Result<Launch, EngineError> {
        let runner = self
            .inner
            .workers
            .read()
            .get(&options.task_queue)
            .cloned()
            .ok_or_else(|| EngineError::NoWorker(options.task_queue.clone()))?;

        let duplicate = state.executions.values().any(|e| {
            e.info.workflow_id == options.workflow_id && e.info.status == WorkflowStatus::Running
        });
        if duplicate {
            return Err(EngineError::AlreadyRunning(options.workflow_id));
        }

        let operation = input.command();
        let handle = RunHandle { workflow_id: options.workflow_id, run_id: Uuid::new_v4().to_string() };
        let cancel = CancellationToken::new();
        let (done, _) = watch::channel(false);
        let info = ExecutionInfo {
            workflow_id: handle.workflow_id.clone(),
            run_id: handle.run_id.clone(),
            workflow_type: workflow_type(operation).to_string(),
            operation,
            status: WorkflowStatus::Running,
            start_time: self.inner.clock.now_utc(),
            close_time: None,
            error: None,
        };
        state
            .executions
            .insert(handle.run_id.clone(), Execution { info, cancel: cancel.clone(), outcome: None, done });

        Ok(Launch {
            handle,
            runner,
            input,
            cancel,
            task_queue: options.task_queue,
            timeout: options.execution_timeout,
        })
    }

    fn launch(&self, launch: Launch) -> RunHandle {
        let Launch { handle, runner, input, cancel, task_queue, timeout } = launch;
        tracing::info!(
            workflow_id = %handle.workflow_id,
            run_id = %handle.run_id,
            operation = %input.command(),
            task_queue = %task_queue,
            "workflow started"
        );
        tokio::spawn(self.clone().drive(handle.clone(), runner, input, cancel, timeout));
        handle
    }

    async fn drive(
        self,
        handle: RunHandle,
        runner: Arc<dyn WorkflowRunner>,
        input: WorkflowInput,
        cancel: CancellationToken,
        timeout: Duration,
    ) {
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = {
            let cancel = cancel.clone();
            let timed_out = Arc::clone(&timed_out);
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        timed_out.store(true, Ordering::SeqCst);
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        };

        let ctx = WorkflowContext {
            workflow_id: handle.workflow_id.clone(),
            run_id: handle.run_id.clone(),
            cancel: cancel.clone(),
        };
        let result = tokio::spawn(async move { runner.run(ctx, input).await })
            .await
            .unwrap_or_else(|e| Err(WorkflowError::Execution(format!("workflow task failed: {}", e))));
        timer.abort();

        let status = match &result {
            Ok(_) => WorkflowStatus::Completed,
            Err(_) if timed_out.load(Ordering::SeqCst) => WorkflowStatus::TimedOut,
            Err(WorkflowError::Timeout(_)) => WorkflowStatus::TimedOut,
            Err(WorkflowError::Canceled) => WorkflowStatus::Canceled,
            Err(_) if cancel.is_cancelled() => WorkflowStatus::Canceled,
            Err(_) => WorkflowStatus::Failed,
        };
        self.finish(&handle, status, result.map_err(|e| e.to_string()));
    }

    fn finish(&self, handle: &RunHandle, status: WorkflowStatus, outcome: Result<ResultMap, String>) {
        let mut state = self.inner.state.lock();
        let Some(execution) = state.executions.get_mut(&handle.run_id) else {
            return;
        };
        execution.info.status = status;
        execution.info.close_time = Some(self.inner.clock.now_utc());
        execution.info.error = outcome.as_ref().err().cloned();
        execution.outcome = Some(outcome);
        execution.done.send_replace(true);

        match status {
            WorkflowStatus::Completed => {
                tracing::info!(workflow_id = %handle.workflow_id, run_id = %handle.run_id, "workflow completed")
            }
            _ => tracing::warn!(
                workflow_id = %handle.workflow_id,
                run_id = %handle.run_id,
                %status,
                error = execution.info.error.as_deref().unwrap_or(""),
                "workflow did not complete"
            ),
        }
    }

    fn subscribe(&self, handle: &RunHandle) -> Result<watch::Receiver<bool>, EngineError> {
        let state = self.inner.state.lock();
        Ok(state.execution(handle)?.done.subscribe())
    }

    fn describe(&self, schedule_id: &ScheduleId, entry: &ScheduleEntry) -> ScheduleDescription {
        ScheduleDescription {
            schedule_id: schedule_id.clone(),
            cron: entry.cron.clone(),
            action: entry.action.clone(),
            paused: entry.paused,
            note: entry.note.clone(),
            next_fire: entry.next_fire,
            recent_runs: entry.recent_runs.iter().cloned().collect(),
        }
    }
}

fn next_fire(cron: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    parse_cron(cron).ok()?.find_next_occurrence(&after, false).ok()
}

#[async_trait]
impl<C: Clock> WorkflowEngine for LocalEngine<C> {
    fn register_worker(&self, task_queue: &str, runner: Arc<dyn WorkflowRunner>) {
        self.inner.workers.write().insert(task_queue.to_string(), runner);
        tracing::info!(task_queue, "worker registered");
    }

    async fn start_workflow(
        &self,
        options: StartOptions,
        input: WorkflowInput,
    ) -> Result<RunHandle, EngineError> {
        self.start(options, input)
    }

    async fn wait_for_result(&self, handle: &RunHandle) -> Result<ResultMap, EngineError> {
        let mut done = self.subscribe(handle)?;
        if done.wait_for(|finished| *finished).await.is_err() {
            return Err(EngineError::WorkflowNotFound(handle.workflow_id.to_string()));
        }

        let state = self.inner.state.lock();
        let execution = state.execution(handle)?;
        match &execution.outcome {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(EngineError::WorkflowFailed {
                workflow_id: handle.workflow_id.clone(),
                status: execution.info.status,
                message: message.clone(),
            }),
            None => Err(EngineError::WorkflowNotFound(handle.workflow_id.to_string())),
        }
    }

    async fn wait_for_terminal(
        &self,
        handle: &RunHandle,
        timeout: Duration,
    ) -> Result<WorkflowStatus, EngineError> {
        let mut done = self.subscribe(handle)?;
        let waited =
            tokio::time::timeout(timeout, async { done.wait_for(|finished| *finished).await.is_ok() })
                .await;
        match waited {
            Ok(true) => Ok(self.inner.state.lock().execution(handle)?.info.status),
            Ok(false) => Err(EngineError::WorkflowNotFound(handle.workflow_id.to_string())),
            Err(_) => Err(EngineError::WaitTimeout(handle.workflow_id.clone())),
        }
    }

    async fn cancel_workflow(&self, handle: &RunHandle) -> Result<(), EngineError> {
        let state = self.inner.state.lock();
        let execution = state.execution(handle)?;
        if execution.info.status == WorkflowStatus::Running {
            tracing::info!(workflow_id = %handle.workflow_id, run_id = %handle.run_id, "canceling workflow");
            execution.cancel.cancel();
        }
        Ok(())
    }

    async fn describe_workflow(&self, handle: &RunHandle) -> Result<ExecutionInfo, EngineError> {
        Ok(self.inner.state.lock().execution(handle)?.info.clone())
    }

    async fn list_workflows(&self, query: &ListQuery) -> Result<Vec<ExecutionInfo>, EngineError> {
        let state = self.inner.state.lock();
        let mut runs: Vec<ExecutionInfo> =
            state.executions.values().map(|e| &e.info).filter(|info| query.matches(info)).cloned().collect();
        runs.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.workflow_id.cmp(&b.workflow_id)));
        Ok(runs)
    }

    async fn create_schedule(&self, spec: ScheduleSpec) -> Result<(), EngineError> {
        parse_cron(&spec.cron)?;
        let now = self.inner.clock.now_utc();
        let mut state = self.inner.state.lock();
        if state.schedules.contains_key(&spec.schedule_id) {
            return Err(EngineError::ScheduleExists(spec.schedule_id));
        }
        tracing::info!(
            schedule_id = %spec.schedule_id,
            cron = %spec.cron,
            paused = spec.paused,
            "schedule created"
        );
        state.schedules.insert(
            spec.schedule_id,
            ScheduleEntry {
                next_fire: next_fire(&spec.cron, now),
                cron: spec.cron,
                action: spec.action,
                paused: spec.paused,
                note: None,
                recent_runs: VecDeque::new(),
            },
        );
        Ok(())
    }

    async fn update_schedule(
        &self,
        schedule_id: &ScheduleId,
        update: ScheduleUpdate,
    ) -> Result<(), EngineError> {
        if let Some(cron) = &update.cron {
            parse_cron(cron)?;
        }
        let now = self.inner.clock.now_utc();
        let mut state = self.inner.state.lock();
        let entry = state.schedule_mut(schedule_id)?;
        if let Some(cron) = update.cron {
            entry.next_fire = next_fire(&cron, now);
            entry.cron = cron;
        }
        if let Some(action) = update.action {
            entry.action = action;
        }
        tracing::info!(schedule_id = %schedule_id, cron = %entry.cron, operation = %entry.action.operation(), "schedule updated");
        Ok(())
    }

    async fn pause_schedule(&self, schedule_id: &ScheduleId, note: &str) -> Result<(), EngineError> {
        let mut state = self.inner.state.lock();
        let entry = state.schedule_mut(schedule_id)?;
        entry.paused = true;
        entry.note = Some(note.to_string());
        tracing::info!(schedule_id = %schedule_id, note, "schedule paused");
        Ok(())
    }

    async fn unpause_schedule(&self, schedule_id: &ScheduleId, note: &str) -> Result<(), EngineError> {
        let now = self.inner.clock.now_utc();
        let mut state = self.inner.state.lock();
        let entry = state.schedule_mut(schedule_id)?;
        entry.paused = false;
        entry.note = Some(note.to_string());
        // Ticks missed while paused are not caught up.
        entry.next_fire = next_fire(&entry.cron, now);
        tracing::info!(schedule_id = %schedule_id, note, "schedule unpaused");
        Ok(())
    }

    async fn trigger_schedule(
        &self,
        schedule_id: &ScheduleId,
        expected: Command,
    ) -> Result<Option<RunHandle>, EngineError> {
        let now = self.inner.clock.now_utc();
        self.start_scheduled(schedule_id, Some(expected), now)
    }

    async fn delete_schedule(&self, schedule_id: &ScheduleId) -> Result<(), EngineError> {
        let removed = self.inner.state.lock().schedules.remove(schedule_id);
        match removed {
            Some(_) => {
                tracing::info!(schedule_id = %schedule_id, "schedule deleted");
                Ok(())
            }
            None => Err(EngineError::ScheduleNotFound(schedule_id.clone())),
        }
    }

    async fn describe_schedule(&self, schedule_id: &ScheduleId) -> Result<ScheduleDescription, EngineError> {
        let mut state = self.inner.state.lock();
        let entry = state.schedule_mut(schedule_id)?;
        Ok(self.describe(schedule_id, entry))
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
