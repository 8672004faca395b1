//! Overseer - dependency-aware process supervisor
//!
//! Overseer starts, monitors, restarts, and coordinates a fixed set of
//! interdependent long-running services from declarative definitions:
//! each entry names a service, the command that launches it, its
//! environment, a restart policy, its dependencies, and an optional
//! health check.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): process definitions, the lifecycle state
//!   machine, event records, and the error taxonomy
//! - **Service Layer** (`services`): the supervisor core event loop plus
//!   its decision components (registry, scheduler, restart policy, health
//!   monitor, spawner)
//! - **Infrastructure Layer** (`infrastructure`): configuration loading
//!   and logging setup
//! - **CLI Layer** (`cli`): the `overseer` command
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use overseer::domain::models::ProcessSpec;
//! use overseer::services::{SpecRegistry, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(SpecRegistry::load(vec![
//!         ProcessSpec::new("web", "/usr/bin/my-server"),
//!     ])?);
//!     let (supervisor, handle) = Supervisor::new(registry, Default::default());
//!     let run = tokio::spawn(supervisor.run());
//!     handle.start_all().await?;
//!     // ... later
//!     handle.stop_all().await?;
//!     let outcome = run.await?;
//!     assert!(outcome.clean());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, ProbeError, SupervisorError, SupervisorResult};
pub use domain::models::{
    ExitReason, ExitStatus, HealthCheckSpec, HealthState, ProbeTarget, ProcessSpec, ProcessState,
    ProcessStatus, RestartPolicy, SupervisorConfig, SupervisorSnapshot, UnhealthyAction,
};
pub use infrastructure::config::ConfigLoader;
pub use services::{
    DependencyScheduler, HealthMonitor, NetProber, Prober, RestartDecision, RunOutcome,
    SpecRegistry, Supervisor, SupervisorHandle,
};
