//! Top-level supervisor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::event::DEFAULT_EVENT_LOG_CAPACITY;
use super::spec::ProcessSpec;

/// Supervisor-wide settings plus the ordered process definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorConfig {
    /// Grace window before a health-check-less process counts as running.
    #[serde(default = "default_start_grace_ms")]
    pub start_grace_ms: u64,

    /// Capacity of the bounded transition log.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ordered process definitions. Declaration order breaks ties in the
    /// computed startup order.
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
}

const fn default_start_grace_ms() -> u64 {
    500
}

const fn default_event_log_capacity() -> usize {
    DEFAULT_EVENT_LOG_CAPACITY
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            start_grace_ms: default_start_grace_ms(),
            event_log_capacity: default_event_log_capacity(),
            logging: LoggingConfig::default(),
            processes: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
