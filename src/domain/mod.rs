//! Domain layer for the Overseer process supervisor.
//!
//! Contains the process definitions, lifecycle state machine types, event
//! records, and the error taxonomy. No I/O lives here.

pub mod errors;
pub mod models;

// Re-export error types for convenient access
pub use errors::{ConfigError, ProbeError, SupervisorError, SupervisorResult};
