//! Restart policy engine.
//!
//! A pure function of failure history: given the consecutive-failure count,
//! the exit reason, and the spec's policy, decide whether to restart and
//! after what delay. Keeping this free of I/O means every backoff schedule
//! is unit-testable without spawning a process.

use std::time::Duration;

use crate::domain::models::{ExitReason, RestartPolicy};

/// Outcome of a restart decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Schedule a restart after the given backoff delay.
    RestartAfter(Duration),
    /// Attempts exhausted (or restart disabled); mark the process failed.
    GiveUp,
}

/// Decide whether to restart a process after its nth consecutive failure.
///
/// `failure_count` is 1-based: the first unexpected exit is 1. A deliberate
/// stop never restarts, regardless of policy, and `autorestart: false`
/// disables restarts entirely.
pub fn decide(
    policy: &RestartPolicy,
    autorestart: bool,
    failure_count: u32,
    exit: &ExitReason,
) -> RestartDecision {
    if matches!(exit, ExitReason::Requested) || !autorestart {
        return RestartDecision::GiveUp;
    }
    if failure_count > policy.max_restarts {
        return RestartDecision::GiveUp;
    }
    RestartDecision::RestartAfter(backoff_delay(policy, failure_count))
}

/// Exponential backoff: `min(base * multiplier^(n-1), cap)`.
pub fn backoff_delay(policy: &RestartPolicy, failure_count: u32) -> Duration {
    let exponent = failure_count.saturating_sub(1).min(63);
    let factor = policy.multiplier.max(1.0).powi(exponent as i32);
    let base_ms = policy.base_delay_ms as f64;
    let delay_ms = (base_ms * factor).min(policy.max_delay_ms as f64);
    Duration::from_millis(delay_ms as u64)
}
