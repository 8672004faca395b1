//! Child process creation and termination.
//!
//! The spawner creates OS processes from specs, forwards their output
//! streams into the log, and reports terminations to the supervisor's
//! event loop. The child programs are opaque; nothing here interprets
//! their output beyond splitting it into lines.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::domain::errors::SupervisorError;
use crate::domain::models::{ExitStatus, ProcessEvent, ProcessSpec};

/// Spawns children and reports their exits as events.
pub struct Spawner {
    events: mpsc::Sender<(String, ProcessEvent)>,
}

impl Spawner {
    pub fn new(events: mpsc::Sender<(String, ProcessEvent)>) -> Self {
        Self { events }
    }

    /// Spawn the OS process for `spec` and return its PID.
    ///
    /// Stdout and stderr are piped and forwarded line-by-line into
    /// tracing. A detached wait task reports the eventual exit to the
    /// event loop; the caller records the PID and transitions the handle.
    pub fn spawn(&self, spec: &ProcessSpec) -> Result<u32, SupervisorError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref cwd) = spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|err| SupervisorError::Spawn {
            process: spec.name.clone(),
            reason: err.to_string(),
        })?;

        let pid = child.id().ok_or_else(|| SupervisorError::Spawn {
            process: spec.name.clone(),
            reason: "process exited before a pid was available".to_string(),
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_stream(spec.name.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_stream(spec.name.clone(), "stderr", stderr);
        }

        info!(process = %spec.name, pid, command = %spec.command, "Spawned process");

        // Wait task owns the child and reports the exit as an event.
        let name = spec.name.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => map_exit_status(&status),
                Err(err) => {
                    warn!(process = %name, error = %err, "Error waiting for process exit");
                    ExitStatus::Code(-1)
                }
            };
            let _ = events.send((name, ProcessEvent::Exited { status })).await;
        });

        Ok(pid)
    }
}

/// Forward one output stream into tracing, line by line.
fn forward_stream(process: String, stream: &'static str, reader: impl AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "overseer::child", process = %process, stream, "{line}");
        }
    });
}

fn map_exit_status(status: &std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        ExitStatus::Code(code)
    } else {
        ExitStatus::Signal(status.signal().unwrap_or(0))
    }
}

/// Send SIGTERM to request a graceful stop.
pub fn terminate(pid: u32) {
    send_signal(pid, Signal::SIGTERM);
}

/// Send SIGKILL after a grace timeout has elapsed.
pub fn force_kill(pid: u32) {
    send_signal(pid, Signal::SIGKILL);
}

fn send_signal(pid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "PID does not fit a signed 32-bit value; cannot signal");
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw), signal) {
        // Racing a natural exit is expected; ESRCH just means it is gone.
        debug!(pid, signal = %signal, error = %err, "Failed to signal process");
    }
}
