//! Supervisor core: the single-writer control loop.
//!
//! All mutable process state lives behind one event-processing loop.
//! Spawn-wait tasks, probe loops, and timers send `(name, event)` messages;
//! control operations arrive as commands with reply channels. The loop is
//! the sole consumer and the sole mutator, so per-process transitions are
//! applied in the order their triggering events are observed, and a
//! concurrent stop request and exit merge as "Stopping wins".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{SupervisorError, SupervisorResult};
use crate::domain::models::{
    EventLog, ExitReason, ExitStatus, HealthState, ProcessEvent, ProcessSpec, ProcessState,
    ProcessStatus, SupervisorConfig, SupervisorSnapshot, TransitionRecord, UnhealthyAction,
};

use super::health::{HealthMonitor, NetProber, Prober};
use super::registry::SpecRegistry;
use super::restart::{self, RestartDecision};
use super::scheduler::DependencyScheduler;
use super::spawner::{self, Spawner};

/// Control operations accepted by the supervisor.
enum ControlRequest {
    StartAll(oneshot::Sender<SupervisorResult<()>>),
    StopAll(oneshot::Sender<()>),
    Restart {
        name: String,
        reply: oneshot::Sender<SupervisorResult<()>>,
    },
    ResetFailed {
        name: String,
        reply: oneshot::Sender<SupervisorResult<()>>,
    },
    Status(oneshot::Sender<SupervisorSnapshot>),
}

/// Cloneable client for a running [`Supervisor`].
#[derive(Clone)]
pub struct SupervisorHandle {
    control_tx: mpsc::Sender<ControlRequest>,
}

impl SupervisorHandle {
    /// Start every startable process, respecting dependency order.
    pub async fn start_all(&self) -> SupervisorResult<()> {
        self.request(ControlRequest::StartAll).await?
    }

    /// Gracefully stop everything; resolves once all processes settled.
    pub async fn stop_all(&self) -> SupervisorResult<()> {
        self.request(ControlRequest::StopAll).await
    }

    /// Stop (if live) and immediately re-start one process.
    pub async fn restart(&self, name: impl Into<String>) -> SupervisorResult<()> {
        let name = name.into();
        self.request(|reply| ControlRequest::Restart { name, reply })
            .await?
    }

    /// Clear a `Failed` process back to `Pending`.
    pub async fn reset_failed(&self, name: impl Into<String>) -> SupervisorResult<()> {
        let name = name.into();
        self.request(|reply| ControlRequest::ResetFailed { name, reply })
            .await?
    }

    /// Read-only snapshot of every process and the recent transition log.
    pub async fn status(&self) -> SupervisorResult<SupervisorSnapshot> {
        self.request(ControlRequest::Status).await
    }

    async fn request<T, F>(&self, build: F) -> SupervisorResult<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> ControlRequest,
    {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(build(tx))
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?;
        rx.await.map_err(|_| SupervisorError::ChannelClosed)
    }
}

/// Result of a completed supervisor run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Processes left in the `Failed` state at shutdown.
    pub failed: Vec<String>,
    /// Final snapshot, taken after every process settled.
    pub snapshot: SupervisorSnapshot,
}

impl RunOutcome {
    pub fn clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mutable runtime record for one process. Owned exclusively by the core.
struct ProcessHandle {
    spec: ProcessSpec,
    state: ProcessState,
    pid: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    running_since: Option<Instant>,
    failure_count: u32,
    last_exit: Option<ExitStatus>,
    health: HealthState,
    last_probe_at: Option<DateTime<Utc>>,
    /// Bumped on every spawn, stop, and reset; events carrying a stale
    /// generation are discarded, which is how in-flight timers cancel.
    generation: u64,
    probe_task: Option<JoinHandle<()>>,
    /// A manual restart is waiting for the current instance to stop.
    pending_restart: bool,
    /// The current termination was initiated by failed health probes.
    unhealthy_kill: bool,
}

impl ProcessHandle {
    fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            state: ProcessState::Pending,
            pid: None,
            started_at: None,
            running_since: None,
            failure_count: 0,
            last_exit: None,
            health: HealthState::Unknown,
            last_probe_at: None,
            generation: 0,
            probe_task: None,
            pending_restart: false,
            unhealthy_kill: false,
        }
    }

    fn abort_probe(&mut self) {
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
    }
}

/// The supervisor core. Create with [`Supervisor::new`], drive with
/// [`Supervisor::run`], control through the returned [`SupervisorHandle`].
pub struct Supervisor {
    registry: Arc<SpecRegistry>,
    scheduler: DependencyScheduler,
    config: SupervisorConfig,
    spawner: Spawner,
    monitor: HealthMonitor,
    handles: HashMap<String, ProcessHandle>,
    log: EventLog,
    events_tx: mpsc::Sender<(String, ProcessEvent)>,
    events_rx: mpsc::Receiver<(String, ProcessEvent)>,
    control_rx: mpsc::Receiver<ControlRequest>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: bool,
    stop_waiters: Vec<oneshot::Sender<()>>,
}

impl Supervisor {
    /// Build a supervisor probing over real TCP/HTTP.
    pub fn new(registry: Arc<SpecRegistry>, config: SupervisorConfig) -> (Self, SupervisorHandle) {
        Self::with_prober(registry, config, Arc::new(NetProber::new()))
    }

    /// Build a supervisor with an injected prober (used by tests).
    pub fn with_prober(
        registry: Arc<SpecRegistry>,
        config: SupervisorConfig,
        prober: Arc<dyn Prober>,
    ) -> (Self, SupervisorHandle) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (control_tx, control_rx) = mpsc::channel(32);
        let (shutdown_tx, _) = broadcast::channel(1);

        let scheduler = DependencyScheduler::new(&registry);
        let handles = registry
            .iter()
            .map(|spec| (spec.name.clone(), ProcessHandle::new(spec.clone())))
            .collect();

        let supervisor = Self {
            scheduler,
            spawner: Spawner::new(events_tx.clone()),
            monitor: HealthMonitor::new(prober, events_tx.clone()),
            handles,
            log: EventLog::new(config.event_log_capacity),
            registry,
            config,
            events_tx,
            events_rx,
            control_rx,
            shutdown_tx,
            shutting_down: false,
            stop_waiters: Vec::new(),
        };
        let handle = SupervisorHandle { control_tx };
        (supervisor, handle)
    }

    /// Run the control loop until a `stop_all` completes.
    pub async fn run(mut self) -> RunOutcome {
        info!(processes = self.registry.len(), "Supervisor started");

        loop {
            tokio::select! {
                Some(request) = self.control_rx.recv() => self.handle_control(request),
                Some((name, event)) = self.events_rx.recv() => self.handle_event(&name, event),
                else => break,
            }

            if self.shutting_down && self.all_settled() {
                break;
            }
        }

        // Cancel probe loops and wake stop waiters.
        let _ = self.shutdown_tx.send(());
        for handle in self.handles.values_mut() {
            handle.abort_probe();
        }
        for waiter in self.stop_waiters.drain(..) {
            let _ = waiter.send(());
        }

        let failed: Vec<String> = self
            .registry
            .names()
            .filter(|n| self.state_of(n) == ProcessState::Failed)
            .map(ToString::to_string)
            .collect();

        if failed.is_empty() {
            info!("Supervisor stopped cleanly");
        } else {
            warn!(?failed, "Supervisor stopped with permanently failed processes");
        }
        let snapshot = self.snapshot();
        RunOutcome { failed, snapshot }
    }

    // ========================================================================
    // Control requests
    // ========================================================================

    fn handle_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::StartAll(reply) => {
                let result = if self.shutting_down {
                    Err(SupervisorError::ShuttingDown)
                } else {
                    self.try_start_ready();
                    Ok(())
                };
                let _ = reply.send(result);
            }
            ControlRequest::StopAll(reply) => {
                self.stop_waiters.push(reply);
                self.begin_shutdown();
            }
            ControlRequest::Restart { name, reply } => {
                let result = self.restart_one(&name);
                let _ = reply.send(result);
            }
            ControlRequest::ResetFailed { name, reply } => {
                let result = self.reset_failed(&name);
                let _ = reply.send(result);
            }
            ControlRequest::Status(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn restart_one(&mut self, name: &str) -> SupervisorResult<()> {
        if self.shutting_down {
            return Err(SupervisorError::ShuttingDown);
        }
        if !self.handles.contains_key(name) {
            return Err(SupervisorError::ProcessNotFound(name.to_string()));
        }

        match self.state_of(name) {
            ProcessState::Starting | ProcessState::Running => {
                if let Some(handle) = self.handles.get_mut(name) {
                    handle.pending_restart = true;
                }
                self.initiate_stop(name, "restart requested");
            }
            ProcessState::Stopping => {
                if let Some(handle) = self.handles.get_mut(name) {
                    handle.pending_restart = true;
                }
            }
            // A manual restart overrides a pending backoff timer and clears
            // failure history; the operator asked for a fresh attempt.
            ProcessState::Restarting
            | ProcessState::Pending
            | ProcessState::Stopped
            | ProcessState::Exited
            | ProcessState::Failed => {
                if let Some(handle) = self.handles.get_mut(name) {
                    handle.generation += 1;
                    handle.failure_count = 0;
                }
                self.start_process(name);
            }
        }
        Ok(())
    }

    fn reset_failed(&mut self, name: &str) -> SupervisorResult<()> {
        let Some(handle) = self.handles.get_mut(name) else {
            return Err(SupervisorError::ProcessNotFound(name.to_string()));
        };
        if handle.state != ProcessState::Failed {
            return Err(SupervisorError::NotFailed {
                process: name.to_string(),
                state: handle.state,
            });
        }
        handle.generation += 1;
        handle.failure_count = 0;
        handle.health = HealthState::Unknown;
        self.transition(name, ProcessState::Pending, Some("reset".to_string()));
        Ok(())
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Start every `Pending` process whose dependencies are all `Running`.
    fn try_start_ready(&mut self) {
        if self.shutting_down {
            return;
        }
        let running: HashSet<String> = self
            .handles
            .iter()
            .filter(|(_, h)| h.state == ProcessState::Running)
            .map(|(n, _)| n.clone())
            .collect();

        let startable: Vec<String> = self
            .scheduler
            .next_startable(&running)
            .into_iter()
            .filter(|n| self.state_of(n) == ProcessState::Pending)
            .collect();

        for name in startable {
            self.start_process(&name);
        }
    }

    /// Spawn one process and begin its startup phase.
    fn start_process(&mut self, name: &str) {
        let Some(handle) = self.handles.get_mut(name) else {
            return;
        };
        handle.generation += 1;
        let generation = handle.generation;
        let spec = handle.spec.clone();

        self.transition(name, ProcessState::Starting, None);

        match self.spawner.spawn(&spec) {
            Ok(pid) => {
                if let Some(handle) = self.handles.get_mut(name) {
                    handle.pid = Some(pid);
                    handle.started_at = Some(Utc::now());
                    handle.health = HealthState::Unknown;
                    handle.unhealthy_kill = false;

                    if let Some(check) = spec.health.clone() {
                        // Running is declared by the first healthy probe
                        let task = self.monitor.start_probing(
                            name.to_string(),
                            check,
                            self.shutdown_tx.subscribe(),
                        );
                        handle.probe_task = Some(task);
                    } else {
                        self.schedule_event(
                            name,
                            self.config.start_grace(),
                            ProcessEvent::StartGraceElapsed { generation },
                        );
                    }
                }
            }
            Err(err) => {
                warn!(process = %name, error = %err, "Spawn failed");
                self.handle_unexpected_exit(name, ExitReason::SpawnFailed(err.to_string()));
            }
        }
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    fn handle_event(&mut self, name: &str, event: ProcessEvent) {
        if !self.handles.contains_key(name) {
            debug!(process = %name, "Event for unknown process dropped");
            return;
        }
        match event {
            ProcessEvent::Exited { status } => self.on_exited(name, status),
            ProcessEvent::StartGraceElapsed { generation } => {
                if self.generation_of(name) == generation
                    && self.state_of(name) == ProcessState::Starting
                {
                    self.declare_running(name, "start grace elapsed");
                }
            }
            ProcessEvent::RestartTimerFired { generation } => {
                if self.generation_of(name) == generation
                    && self.state_of(name) == ProcessState::Restarting
                    && !self.shutting_down
                {
                    self.start_process(name);
                }
            }
            ProcessEvent::StabilityWindowElapsed { generation } => {
                if self.generation_of(name) == generation
                    && self.state_of(name) == ProcessState::Running
                {
                    if let Some(handle) = self.handles.get_mut(name) {
                        if handle.failure_count > 0 {
                            debug!(process = %name, "Stable past window, failure count cleared");
                            handle.failure_count = 0;
                        }
                    }
                }
            }
            ProcessEvent::StopGraceElapsed { generation } => self.on_stop_grace(name, generation),
            ProcessEvent::Health { healthy } => self.on_health(name, healthy),
        }
    }

    fn on_exited(&mut self, name: &str, status: ExitStatus) {
        let Some(handle) = self.handles.get_mut(name) else {
            return;
        };
        handle.pid = None;
        handle.last_exit = Some(status);
        handle.abort_probe();
        let state = handle.state;
        let unhealthy_kill = std::mem::take(&mut handle.unhealthy_kill);

        // Stopping wins: once a stop has been requested (per process or as
        // part of a global shutdown), the exit is the expected stop.
        if state == ProcessState::Stopping || (self.shutting_down && state.is_live()) {
            self.transition(name, ProcessState::Stopped, Some(status.to_string()));
            let pending_restart = self
                .handles
                .get_mut(name)
                .is_some_and(|h| std::mem::take(&mut h.pending_restart));
            if self.shutting_down {
                self.advance_shutdown();
            } else if pending_restart {
                self.start_process(name);
            }
            return;
        }

        if state.is_live() {
            let reason = if unhealthy_kill {
                ExitReason::Unhealthy
            } else {
                ExitReason::Unexpected(status)
            };
            self.handle_unexpected_exit(name, reason);
        } else {
            debug!(process = %name, state = %state, "Late exit event ignored");
        }
    }

    /// Apply the restart policy after an unexpected exit (or spawn failure).
    fn handle_unexpected_exit(&mut self, name: &str, reason: ExitReason) {
        let Some(handle) = self.handles.get_mut(name) else {
            return;
        };

        // A stretch of stable running forgives earlier failures.
        if let Some(since) = handle.running_since.take() {
            if since.elapsed() >= handle.spec.restart.stability_window() {
                handle.failure_count = 0;
            }
        }
        handle.failure_count += 1;
        let failure_count = handle.failure_count;
        let generation = handle.generation;
        let policy = handle.spec.restart.clone();
        let autorestart = handle.spec.autorestart;

        self.transition(name, ProcessState::Exited, Some(reason.to_string()));

        match restart::decide(&policy, autorestart, failure_count, &reason) {
            RestartDecision::RestartAfter(delay) => {
                self.transition(
                    name,
                    ProcessState::Restarting,
                    Some(format!("attempt {failure_count}, delay {delay:?}")),
                );
                self.schedule_event(name, delay, ProcessEvent::RestartTimerFired { generation });
            }
            RestartDecision::GiveUp => {
                warn!(process = %name, failure_count, "Restart attempts exhausted");
                self.transition(
                    name,
                    ProcessState::Failed,
                    Some("restart attempts exhausted".to_string()),
                );
            }
        }
    }

    fn on_health(&mut self, name: &str, healthy: bool) {
        let state = self.state_of(name);
        // Results for processes that are stopping or stopped are discarded.
        if self.shutting_down
            || !matches!(state, ProcessState::Starting | ProcessState::Running)
        {
            debug!(process = %name, state = %state, healthy, "Probe result discarded");
            return;
        }

        let on_unhealthy = {
            let Some(handle) = self.handles.get_mut(name) else {
                return;
            };
            handle.last_probe_at = Some(Utc::now());
            handle.health = if healthy {
                HealthState::Healthy
            } else {
                HealthState::Unhealthy
            };
            handle
                .spec
                .health
                .as_ref()
                .map_or(UnhealthyAction::Report, |c| c.on_unhealthy)
        };

        if healthy {
            if state == ProcessState::Starting {
                self.declare_running(name, "first healthy probe");
            }
            return;
        }

        match on_unhealthy {
            UnhealthyAction::Report => {
                warn!(process = %name, "Process unhealthy (report only)");
            }
            UnhealthyAction::Restart => {
                warn!(process = %name, "Process unhealthy, terminating for restart");
                let (pid, generation, grace) = {
                    let Some(handle) = self.handles.get_mut(name) else {
                        return;
                    };
                    handle.unhealthy_kill = true;
                    (handle.pid, handle.generation, handle.spec.stop_grace())
                };
                if let Some(pid) = pid {
                    spawner::terminate(pid);
                    self.schedule_event(
                        name,
                        grace,
                        ProcessEvent::StopGraceElapsed { generation },
                    );
                }
            }
        }
    }

    fn on_stop_grace(&mut self, name: &str, generation: u64) {
        let Some(handle) = self.handles.get_mut(name) else {
            return;
        };
        if handle.generation != generation {
            return;
        }
        let stopping = handle.state == ProcessState::Stopping
            || (handle.state.is_live() && handle.unhealthy_kill);
        if let (true, Some(pid)) = (stopping, handle.pid) {
            warn!(
                process = %name,
                pid,
                grace_ms = handle.spec.stop_grace_ms,
                "Shutdown grace timeout, force killing"
            );
            spawner::force_kill(pid);
        }
    }

    fn declare_running(&mut self, name: &str, detail: &str) {
        let (generation, window) = {
            let Some(handle) = self.handles.get_mut(name) else {
                return;
            };
            handle.running_since = Some(Instant::now());
            (handle.generation, handle.spec.restart.stability_window())
        };
        self.transition(name, ProcessState::Running, Some(detail.to_string()));
        // Arm the counter reset; superseded timers carry a stale generation.
        self.schedule_event(
            name,
            window,
            ProcessEvent::StabilityWindowElapsed { generation },
        );
        self.try_start_ready();
    }

    // ========================================================================
    // Shutdown sequencing
    // ========================================================================

    fn begin_shutdown(&mut self) {
        if !self.shutting_down {
            self.shutting_down = true;
            info!("Shutdown requested");

            // Cancel pending restart timers; those processes will not come
            // back in this run.
            let restarting: Vec<String> = self
                .handles
                .iter()
                .filter(|(_, h)| h.state == ProcessState::Restarting)
                .map(|(n, _)| n.clone())
                .collect();
            for name in restarting {
                if let Some(handle) = self.handles.get_mut(&name) {
                    handle.generation += 1;
                }
                self.transition(
                    &name,
                    ProcessState::Stopped,
                    Some("restart canceled by shutdown".to_string()),
                );
            }
        }
        self.advance_shutdown();
    }

    /// Stop every live process whose dependents have all settled, in
    /// reverse dependency order. Re-invoked as exits are observed.
    fn advance_shutdown(&mut self) {
        for name in self.scheduler.shutdown_order() {
            let state = self.state_of(&name);
            if !matches!(state, ProcessState::Starting | ProcessState::Running) {
                continue;
            }
            let dependents_live = self
                .scheduler
                .dependents_of(&name)
                .iter()
                .any(|d| self.state_of(d).is_live());
            if !dependents_live {
                self.initiate_stop(&name, "shutdown");
            }
        }
    }

    /// Send SIGTERM and arm the force-kill grace timer.
    fn initiate_stop(&mut self, name: &str, detail: &str) {
        let (pid, generation, grace) = {
            let Some(handle) = self.handles.get_mut(name) else {
                return;
            };
            handle.generation += 1;
            handle.abort_probe();
            (handle.pid, handle.generation, handle.spec.stop_grace())
        };

        self.transition(name, ProcessState::Stopping, Some(detail.to_string()));

        if let Some(pid) = pid {
            spawner::terminate(pid);
            self.schedule_event(name, grace, ProcessEvent::StopGraceElapsed { generation });
        } else {
            // Nothing alive to signal; settle immediately.
            self.transition(name, ProcessState::Stopped, None);
            if self.shutting_down {
                self.advance_shutdown();
            }
        }
    }

    fn all_settled(&self) -> bool {
        self.handles.values().all(|h| !h.state.is_live())
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn state_of(&self, name: &str) -> ProcessState {
        self.handles
            .get(name)
            .map_or(ProcessState::Pending, |h| h.state)
    }

    fn generation_of(&self, name: &str) -> u64 {
        self.handles.get(name).map_or(0, |h| h.generation)
    }

    /// Record one lifecycle transition in the log and in tracing.
    fn transition(&mut self, name: &str, to: ProcessState, detail: Option<String>) {
        let Some(handle) = self.handles.get_mut(name) else {
            return;
        };
        let from = handle.state;
        if from == to {
            return;
        }
        handle.state = to;
        info!(process = %name, from = %from, to = %to, detail = detail.as_deref(), "State transition");
        self.log.push(TransitionRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            process: name.to_string(),
            from,
            to,
            detail,
        });
    }

    fn schedule_event(&self, name: &str, delay: Duration, event: ProcessEvent) {
        let events = self.events_tx.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send((name, event)).await;
        });
    }

    fn snapshot(&self) -> SupervisorSnapshot {
        let processes = self
            .registry
            .names()
            .filter_map(|name| self.handles.get(name))
            .map(|handle| ProcessStatus {
                name: handle.spec.name.clone(),
                state: handle.state,
                pid: handle.pid,
                started_at: handle.started_at,
                uptime_secs: handle
                    .running_since
                    .filter(|_| handle.state.is_live())
                    .map(|since| since.elapsed().as_secs()),
                failure_count: handle.failure_count,
                last_exit: handle.last_exit,
                health: handle.health,
                last_probe_at: handle.last_probe_at,
            })
            .collect();

        SupervisorSnapshot {
            processes,
            recent_events: self.log.records().cloned().collect(),
            shutting_down: self.shutting_down,
        }
    }
}
