//! Lifecycle state machine types for managed processes.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one managed process.
///
/// Transitions are applied exclusively by the supervisor core:
///
/// ```text
/// Pending -> Starting -> Running -> Stopping -> Stopped
///                |          |
///                |          +-> Exited -> Restarting -> Starting
///                |                  \-> Failed
///                +-> Exited (spawn failure or death during startup)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Declared but not yet startable or not yet started.
    Pending,
    /// Spawned, waiting for the first health pass or the start grace window.
    Starting,
    /// Alive and considered healthy enough to unblock dependents.
    Running,
    /// Graceful termination requested, waiting for the exit.
    Stopping,
    /// Terminated as requested.
    Stopped,
    /// Terminated unexpectedly, restart decision pending.
    Exited,
    /// Restart timer armed, will re-enter `Starting` when it fires.
    Restarting,
    /// Restart policy gave up. Terminal until an explicit reset.
    Failed,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Exited => "exited",
            Self::Restarting => "restarting",
            Self::Failed => "failed",
        }
    }

    /// Whether an OS process may currently exist for this state.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an OS process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Normal exit with a code.
    Code(i32),
    /// Killed by a signal.
    Signal(i32),
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(sig) => write!(f, "signal {sig}"),
        }
    }
}

/// Why a process stopped running, as seen by the restart policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The process died on its own.
    Unexpected(ExitStatus),
    /// The OS refused to create the process.
    SpawnFailed(String),
    /// Terminated by the supervisor after sustained probe failures.
    Unhealthy,
    /// Deliberately stopped by an external request. Never restarted.
    Requested,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unexpected(status) => write!(f, "unexpected exit ({status})"),
            Self::SpawnFailed(err) => write!(f, "spawn failed: {err}"),
            Self::Unhealthy => f.write_str("health probes exhausted"),
            Self::Requested => f.write_str("stop requested"),
        }
    }
}

/// Last-known probe verdict for a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// No probe has completed yet, or no health check is configured.
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
