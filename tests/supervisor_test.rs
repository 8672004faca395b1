//! End-to-end scenarios driving a real supervisor over real child
//! processes (`/bin/sh`). Timing-sensitive values use millisecond-scale
//! policies with generous polling deadlines.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use overseer::domain::errors::ProbeError;
use overseer::domain::models::{
    ExitStatus, HealthCheckSpec, ProbeTarget, ProcessSpec, ProcessState, RestartPolicy,
    SupervisorConfig, SupervisorSnapshot, UnhealthyAction,
};
use overseer::services::{Prober, SpecRegistry, Supervisor, SupervisorHandle};
use tokio::task::JoinHandle;

fn sh(name: &str, script: &str) -> ProcessSpec {
    let mut spec = ProcessSpec::new(name, "/bin/sh");
    spec.args = vec!["-c".into(), script.into()];
    spec
}

fn fast_policy(max_restarts: u32) -> RestartPolicy {
    RestartPolicy {
        max_restarts,
        base_delay_ms: 20,
        multiplier: 2.0,
        max_delay_ms: 200,
        stability_window_ms: 60_000,
    }
}

fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        start_grace_ms: 50,
        ..SupervisorConfig::default()
    }
}

fn launch(
    specs: Vec<ProcessSpec>,
    config: SupervisorConfig,
) -> (SupervisorHandle, JoinHandle<overseer::services::RunOutcome>) {
    let registry = Arc::new(SpecRegistry::load(specs).expect("valid specs"));
    let (supervisor, handle) = Supervisor::new(registry, config);
    let run = tokio::spawn(supervisor.run());
    (handle, run)
}

async fn wait_for_state(handle: &SupervisorHandle, name: &str, state: ProcessState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = handle.status().await.expect("supervisor alive");
        let current = state_of(&snapshot, name);
        if current == state {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{name} stuck in {current}, wanted {state}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn state_of(snapshot: &SupervisorSnapshot, name: &str) -> ProcessState {
    snapshot
        .processes
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.state)
        .expect("process present in snapshot")
}

#[tokio::test]
async fn crashing_process_retries_then_fails() {
    let mut spec = sh("crasher", "exit 1");
    spec.restart = fast_policy(3);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "crasher", ProcessState::Failed).await;

    let snapshot = handle.status().await.expect("status");
    let status = &snapshot.processes[0];
    // Three retries plus the terminal failure.
    assert_eq!(status.failure_count, 4);
    let restarts = snapshot
        .recent_events
        .iter()
        .filter(|r| r.process == "crasher" && r.to == ProcessState::Restarting)
        .count();
    assert_eq!(restarts, 3);

    handle.stop_all().await.expect("stop");
    let outcome = run.await.expect("run task");
    assert_eq!(outcome.failed, vec!["crasher".to_string()]);
    assert!(!outcome.clean());
}

#[tokio::test]
async fn deliberate_stop_is_never_restarted() {
    let mut spec = sh("steady", "sleep 30");
    spec.restart = fast_policy(5);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "steady", ProcessState::Running).await;

    handle.stop_all().await.expect("stop");
    let outcome = run.await.expect("run task");
    assert!(outcome.clean());
    // The final snapshot reflects the settled state, not the last live view.
    assert_eq!(state_of(&outcome.snapshot, "steady"), ProcessState::Stopped);
}

#[tokio::test]
async fn sigterm_immune_child_is_force_killed() {
    // The child ignores SIGTERM; the grace timeout must escalate to
    // SIGKILL so a stop always settles.
    let mut spec = sh("stubborn", r#"trap "" TERM; sleep 30"#);
    spec.stop_grace_ms = 100;
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "stubborn", ProcessState::Running).await;

    let requested = tokio::time::Instant::now();
    handle.stop_all().await.expect("stop");
    assert!(
        requested.elapsed() >= Duration::from_millis(100),
        "settled before the grace timeout could have escalated"
    );

    let outcome = run.await.expect("run task");
    assert!(outcome.clean());
    let status = &outcome.snapshot.processes[0];
    assert_eq!(status.state, ProcessState::Stopped);
    assert_eq!(status.last_exit, Some(ExitStatus::Signal(9)));
}

#[tokio::test]
async fn stable_run_clears_failure_count() {
    // Crashes on the first attempt, then runs cleanly; once the stability
    // window passes the failure counter must read zero again.
    let dir = tempfile::tempdir().expect("tempdir");
    let flag = dir.path().join("ran-once");
    let script = format!(
        "if [ -e {0} ]; then sleep 30; else : > {0}; exit 1; fi",
        flag.display()
    );
    let mut spec = sh("settler", &script);
    spec.restart = RestartPolicy {
        max_restarts: 3,
        base_delay_ms: 20,
        multiplier: 2.0,
        max_delay_ms: 200,
        stability_window_ms: 100,
    };
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "settler", ProcessState::Running).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = handle.status().await.expect("status");
        let status = &snapshot.processes[0];
        if status.state == ProcessState::Running && status.failure_count == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "failure count never reset, still {}",
            status.failure_count
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn stop_racing_an_exit_still_settles_stopped() {
    // The child exits on its own right as shutdown is requested. Whichever
    // side the event loop sees first, the process must settle as Stopped
    // and must not be restarted.
    let mut spec = sh("racer", "exit 1");
    spec.restart = fast_policy(10);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    handle.stop_all().await.expect("stop");

    let outcome = run.await.expect("run task");
    assert!(outcome.clean(), "unexpected failed set: {:?}", outcome.failed);
}

#[tokio::test]
async fn dependent_waits_for_dependency_to_run() {
    let upstream = sh("db", "sleep 30");
    let mut downstream = sh("api", "sleep 30");
    downstream.depends_on = vec!["db".into()];
    let (handle, run) = launch(vec![upstream, downstream], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "api", ProcessState::Running).await;

    let snapshot = handle.status().await.expect("status");
    let index_of = |name: &str, to: ProcessState| {
        snapshot
            .recent_events
            .iter()
            .position(|r| r.process == name && r.to == to)
            .expect("transition recorded")
    };
    assert!(
        index_of("db", ProcessState::Running) < index_of("api", ProcessState::Starting),
        "api started before db was running"
    );

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn failed_dependency_keeps_dependents_pending() {
    let mut a = sh("a", "exit 7");
    a.restart = fast_policy(1);
    let mut b = sh("b", "sleep 30");
    b.depends_on = vec!["a".into()];
    let mut c = sh("c", "sleep 30");
    c.depends_on = vec!["b".into()];
    let (handle, run) = launch(vec![a, b, c], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "a", ProcessState::Failed).await;

    let snapshot = handle.status().await.expect("status");
    assert_eq!(state_of(&snapshot, "b"), ProcessState::Pending);
    assert_eq!(state_of(&snapshot, "c"), ProcessState::Pending);

    handle.stop_all().await.expect("stop");
    let outcome = run.await.expect("run task");
    assert_eq!(outcome.failed, vec!["a".to_string()]);
}

#[tokio::test]
async fn reset_failed_allows_a_fresh_start() {
    let mut spec = sh("flaky", "exit 1");
    spec.restart = fast_policy(0);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "flaky", ProcessState::Failed).await;

    handle.reset_failed("flaky").await.expect("reset");
    let snapshot = handle.status().await.expect("status");
    assert_eq!(state_of(&snapshot, "flaky"), ProcessState::Pending);
    assert_eq!(snapshot.processes[0].failure_count, 0);

    handle.start_all().await.expect("start again");
    wait_for_state(&handle, "flaky", ProcessState::Failed).await;

    handle.stop_all().await.expect("stop");
    let _ = run.await.expect("run task");
}

#[tokio::test]
async fn reset_failed_rejects_non_failed_process() {
    let spec = sh("steady", "sleep 30");
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "steady", ProcessState::Running).await;

    let err = handle.reset_failed("steady").await.expect_err("not failed");
    assert!(err.to_string().contains("steady"));

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn manual_restart_cycles_a_running_process() {
    let spec = sh("steady", "sleep 30");
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "steady", ProcessState::Running).await;
    let first_pid = handle.status().await.expect("status").processes[0].pid;

    handle.restart("steady").await.expect("restart");
    wait_for_state(&handle, "steady", ProcessState::Running).await;
    let snapshot = handle.status().await.expect("status");
    assert_ne!(snapshot.processes[0].pid, first_pid);
    // A requested stop must not count against the restart budget.
    assert_eq!(snapshot.processes[0].failure_count, 0);

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

/// Scripted prober: successes until `healthy_probes` is exhausted, then
/// failures forever.
struct ScriptedProber {
    healthy_probes: u32,
    served: AtomicU32,
}

impl ScriptedProber {
    fn new(healthy_probes: u32) -> Self {
        Self {
            healthy_probes,
            served: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _target: &ProbeTarget, _timeout: Duration) -> Result<(), ProbeError> {
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        if n < self.healthy_probes {
            Ok(())
        } else {
            Err(ProbeError::Timeout { timeout_ms: 1 })
        }
    }
}

fn probed(name: &str, script: &str, on_unhealthy: UnhealthyAction) -> ProcessSpec {
    let mut spec = sh(name, script);
    spec.health = Some(HealthCheckSpec {
        probe: ProbeTarget::Tcp {
            addr: "127.0.0.1:1".into(),
        },
        interval_ms: 20,
        timeout_ms: 50,
        failure_threshold: 2,
        on_unhealthy,
    });
    spec
}

fn launch_with_prober(
    specs: Vec<ProcessSpec>,
    prober: Arc<dyn Prober>,
) -> (SupervisorHandle, JoinHandle<overseer::services::RunOutcome>) {
    let registry = Arc::new(SpecRegistry::load(specs).expect("valid specs"));
    let (supervisor, handle) = Supervisor::with_prober(registry, test_config(), prober);
    let run = tokio::spawn(supervisor.run());
    (handle, run)
}

#[tokio::test]
async fn first_healthy_probe_promotes_to_running() {
    let spec = probed("svc", "sleep 30", UnhealthyAction::Report);
    let (handle, run) = launch_with_prober(vec![spec], Arc::new(ScriptedProber::new(u32::MAX)));

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "svc", ProcessState::Running).await;

    let snapshot = handle.status().await.expect("status");
    assert!(snapshot.processes[0].last_probe_at.is_some());

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn unhealthy_report_leaves_process_running() {
    // Healthy long enough to be promoted, then permanently unhealthy.
    let spec = probed("svc", "sleep 30", UnhealthyAction::Report);
    let (handle, run) = launch_with_prober(vec![spec], Arc::new(ScriptedProber::new(2)));

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "svc", ProcessState::Running).await;

    // Give the probe loop time to cross the failure threshold.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = handle.status().await.expect("status");
    assert_eq!(state_of(&snapshot, "svc"), ProcessState::Running);

    handle.stop_all().await.expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn unhealthy_restart_recycles_the_process() {
    let mut spec = probed("svc", "sleep 30", UnhealthyAction::Restart);
    spec.restart = fast_policy(5);
    let (handle, run) = launch_with_prober(vec![spec], Arc::new(ScriptedProber::new(2)));

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "svc", ProcessState::Running).await;

    // The sustained probe failures should kill the child and route it
    // through the restart policy rather than a plain stop.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = handle.status().await.expect("status");
        let restarted = snapshot
            .recent_events
            .iter()
            .any(|r| r.process == "svc" && r.to == ProcessState::Restarting);
        if restarted {
            let stopped = snapshot
                .recent_events
                .iter()
                .any(|r| r.process == "svc" && r.to == ProcessState::Stopped);
            assert!(!stopped, "unhealthy kill must not read as a requested stop");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "process was never recycled"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.stop_all().await.expect("stop");
    let _ = run.await.expect("run task");
}

#[tokio::test]
async fn shutdown_stops_dependents_before_dependencies() {
    let upstream = sh("db", "sleep 30");
    let mut downstream = sh("api", "sleep 30");
    downstream.depends_on = vec!["db".into()];
    let (handle, run) = launch(vec![upstream, downstream], test_config());
    handle.start_all().await.expect("start");
    wait_for_state(&handle, "api", ProcessState::Running).await;

    let stopper = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.stop_all().await })
    };
    // Poll while shutdown is in flight: db may not begin stopping until
    // api has fully stopped.
    loop {
        let Ok(snapshot) = handle.status().await else {
            break;
        };
        let db = state_of(&snapshot, "db");
        let api = state_of(&snapshot, "api");
        if db == ProcessState::Stopping || db == ProcessState::Stopped {
            assert_eq!(api, ProcessState::Stopped, "db stopped while api was live");
        }
        if db == ProcessState::Stopped && api == ProcessState::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    stopper.await.expect("stopper task").expect("stop");
    assert!(run.await.expect("run task").clean());
}

#[tokio::test]
async fn unstartable_command_follows_the_restart_policy() {
    let mut spec = ProcessSpec::new("ghost", "/nonexistent/program");
    spec.restart = fast_policy(1);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "ghost", ProcessState::Failed).await;

    let snapshot = handle.status().await.expect("status");
    assert_eq!(snapshot.processes[0].failure_count, 2);

    handle.stop_all().await.expect("stop");
    let outcome = run.await.expect("run task");
    assert_eq!(outcome.failed, vec!["ghost".to_string()]);
}

#[tokio::test]
async fn autorestart_disabled_never_restarts() {
    let mut spec = sh("oneshot", "exit 0");
    spec.autorestart = false;
    spec.restart = fast_policy(5);
    let (handle, run) = launch(vec![spec], test_config());

    handle.start_all().await.expect("start");
    wait_for_state(&handle, "oneshot", ProcessState::Failed).await;

    let snapshot = handle.status().await.expect("status");
    let restarts = snapshot
        .recent_events
        .iter()
        .filter(|r| r.to == ProcessState::Restarting)
        .count();
    assert_eq!(restarts, 0, "autorestart=false must never restart");

    handle.stop_all().await.expect("stop");
    let _ = run.await.expect("run task");
}
