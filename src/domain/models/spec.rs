//! Declarative definitions of managed processes.
//!
//! A [`ProcessSpec`] is the immutable description of one long-running
//! service: the command that launches it, its environment, its restart
//! policy, the processes it depends on, and an optional health check.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable definition of one managed process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessSpec {
    /// Unique process name.
    pub name: String,

    /// Program to execute.
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the child process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment variables set on the child. Entries override any
    /// variable of the same name inherited from the supervisor.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Names of processes that must be running before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Whether unexpected exits trigger restarts at all.
    #[serde(default = "default_autorestart")]
    pub autorestart: bool,

    /// Restart backoff parameters.
    #[serde(default)]
    pub restart: RestartPolicy,

    /// Optional periodic health check.
    #[serde(default)]
    pub health: Option<HealthCheckSpec>,

    /// Time allowed for a voluntary exit after SIGTERM before SIGKILL.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

const fn default_autorestart() -> bool {
    true
}

const fn default_stop_grace_ms() -> u64 {
    10_000
}

impl ProcessSpec {
    /// Minimal spec with defaults for everything but name and command.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            depends_on: Vec::new(),
            autorestart: default_autorestart(),
            restart: RestartPolicy::default(),
            health: None,
            stop_grace_ms: default_stop_grace_ms(),
        }
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Exponential-backoff restart parameters.
///
/// The delay before the nth restart attempt is
/// `min(base_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RestartPolicy {
    /// Consecutive unexpected exits tolerated before giving up.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Delay before the first restart attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff multiplier applied per consecutive failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on the restart delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Continuous running time after which the failure counter resets.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,
}

const fn default_max_restarts() -> u32 {
    10
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_stability_window_ms() -> u64 {
    10_000
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            stability_window_ms: default_stability_window_ms(),
        }
    }
}

impl RestartPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }
}

/// Periodic liveness probe configuration for one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthCheckSpec {
    /// What to probe.
    pub probe: ProbeTarget,

    /// Interval between probes.
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,

    /// Per-probe timeout.
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive failures before the process is reported unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// What the supervisor does with sustained unhealthiness.
    #[serde(default)]
    pub on_unhealthy: UnhealthyAction,
}

const fn default_probe_interval_ms() -> u64 {
    10_000
}

const fn default_probe_timeout_ms() -> u64 {
    5_000
}

const fn default_failure_threshold() -> u32 {
    3
}

impl HealthCheckSpec {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Health probe target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ProbeTarget {
    /// TCP connect to `addr` (host:port).
    Tcp { addr: String },
    /// HTTP GET to `url`, any 2xx status is healthy.
    Http { url: String },
}

/// Policy coupling sustained unhealthiness to the restart machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhealthyAction {
    /// Record the unhealthy status and keep the process running.
    #[default]
    Report,
    /// Terminate the process and route it through the restart policy.
    Restart,
}
