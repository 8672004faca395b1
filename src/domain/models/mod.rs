//! Domain models: definitions, lifecycle states, events, configuration.

pub mod config;
pub mod event;
pub mod spec;
pub mod state;

pub use config::{LoggingConfig, SupervisorConfig};
pub use event::{
    EventLog, ProcessEvent, ProcessStatus, SupervisorSnapshot, TransitionRecord,
    DEFAULT_EVENT_LOG_CAPACITY,
};
pub use spec::{HealthCheckSpec, ProbeTarget, ProcessSpec, RestartPolicy, UnhealthyAction};
pub use state::{ExitReason, ExitStatus, HealthState, ProcessState};
