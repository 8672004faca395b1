//! Service layer: the supervisor core and its decision components.

pub mod health;
pub mod registry;
pub mod restart;
pub mod scheduler;
pub mod spawner;
pub mod supervisor;

pub use health::{HealthMonitor, NetProber, Prober};
pub use registry::SpecRegistry;
pub use restart::{backoff_delay, decide, RestartDecision};
pub use scheduler::DependencyScheduler;
pub use spawner::Spawner;
pub use supervisor::{RunOutcome, Supervisor, SupervisorHandle};
