//! Error taxonomy for the supervisor.
//!
//! Only [`ConfigError`] is fatal, and only before anything starts. Every
//! per-process failure is isolated: it surfaces in that process's state
//! and the transition log, never as a crash of the control loop.

use thiserror::Error;

use super::models::state::ProcessState;

/// Format a cycle path as a human-readable string: `a -> b -> c -> a`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Invalid process definitions. Fatal at load time; nothing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Duplicate process name: {0}")]
    DuplicateName(String),

    #[error("Process {process} depends on unknown process {dependency}")]
    UnknownDependency { process: String, dependency: String },

    #[error("Process {0} depends on itself")]
    SelfDependency(String),

    #[error("Process {0} has an empty command")]
    EmptyCommand(String),

    #[error("Dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),

    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    #[error("Invalid restart multiplier {multiplier} for process {process}: must be >= 1.0")]
    InvalidMultiplier { process: String, multiplier: f64 },

    #[error("No processes defined")]
    NoProcesses,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// A health probe attempt failed. Feeds the unhealthy streak, never fatal.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("TCP connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP probe failed: {0}")]
    Http(String),

    #[error("HTTP probe of {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Runtime errors surfaced through the control interface.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn process {process}: {reason}")]
    Spawn { process: String, reason: String },

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Process {process} is {state}, not failed; nothing to reset")]
    NotFailed {
        process: String,
        state: ProcessState,
    },

    #[error("Supervisor is shutting down")]
    ShuttingDown,

    #[error("Supervisor control channel closed")]
    ChannelClosed,
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
