//! Events flowing into the supervisor core and the transition log it keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::state::{ExitStatus, HealthState, ProcessState};

/// Default capacity of the bounded transition log.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 256;

/// Per-process event delivered to the supervisor's event loop.
///
/// Producers (spawn-wait tasks, probe loops, timers) only ever send these;
/// the core is the sole consumer and the sole mutator of process state.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// The OS process terminated.
    Exited { status: ExitStatus },
    /// No health check is configured and the start grace window elapsed.
    StartGraceElapsed { generation: u64 },
    /// A restart backoff timer fired.
    RestartTimerFired { generation: u64 },
    /// The process has been running for its full stability window.
    StabilityWindowElapsed { generation: u64 },
    /// A stopping process did not exit within its grace timeout.
    StopGraceElapsed { generation: u64 },
    /// The probe loop observed an up/down transition.
    Health { healthy: bool },
}

/// One recorded lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub process: String,
    pub from: ProcessState,
    pub to: ProcessState,
    /// Free-form context: exit status, restart delay, probe detail.
    pub detail: Option<String>,
}

/// Bounded ring buffer of transition records.
///
/// Oldest entries are dropped once capacity is reached; the log exists for
/// observability, not durability.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<TransitionRecord>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, record: TransitionRecord) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Records in observation order, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

/// Read-only status snapshot for one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    pub failure_count: u32,
    pub last_exit: Option<ExitStatus>,
    pub health: HealthState,
    pub last_probe_at: Option<DateTime<Utc>>,
}

/// Snapshot of the whole supervisor, returned by status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSnapshot {
    pub processes: Vec<ProcessStatus>,
    pub recent_events: Vec<TransitionRecord>,
    pub shutting_down: bool,
}

impl SupervisorSnapshot {
    /// Names of processes currently in the `Failed` state.
    pub fn failed(&self) -> Vec<&str> {
        self.processes
            .iter()
            .filter(|p| p.state == ProcessState::Failed)
            .map(|p| p.name.as_str())
            .collect()
    }
}
