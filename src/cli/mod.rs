//! Command-line interface for the supervisor.

pub mod commands;
pub mod display;
pub mod types;

pub use types::{CheckArgs, Cli, Commands, RunArgs};

/// Clean full shutdown.
pub const EXIT_OK: i32 = 0;
/// One or more processes permanently failed before shutdown completed.
pub const EXIT_PROCESS_FAILED: i32 = 1;
/// Definitions were invalid at load; nothing was started.
pub const EXIT_CONFIG_INVALID: i32 = 2;
