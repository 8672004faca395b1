//! Health monitoring for managed processes.
//!
//! One probe loop runs per process that declares a health check, on its
//! own interval with its own timeout, and reports up/down transitions to
//! the supervisor core as events. Probes never touch supervisor state
//! directly and never block the control loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::errors::ProbeError;
use crate::domain::models::{HealthCheckSpec, ProbeTarget, ProcessEvent};

/// Port for executing a single liveness probe.
///
/// The supervisor only ever sees probe outcomes as events, so policies can
/// be exercised in tests by injecting a scripted prober.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<(), ProbeError>;
}

/// Real prober: TCP connect and HTTP GET.
pub struct NetProber {
    http: reqwest::Client,
}

impl NetProber {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for NetProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for NetProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> Result<(), ProbeError> {
        match target {
            ProbeTarget::Tcp { addr } => {
                match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await {
                    Ok(Ok(_stream)) => Ok(()),
                    Ok(Err(source)) => Err(ProbeError::Connect {
                        addr: addr.clone(),
                        source,
                    }),
                    Err(_) => Err(ProbeError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
            ProbeTarget::Http { url } => {
                match tokio::time::timeout(timeout, self.http.get(url).send()).await {
                    Ok(Ok(response)) => {
                        let status = response.status();
                        if status.is_success() {
                            Ok(())
                        } else {
                            Err(ProbeError::HttpStatus {
                                url: url.clone(),
                                status: status.as_u16(),
                            })
                        }
                    }
                    Ok(Err(err)) => Err(ProbeError::Http(err.to_string())),
                    Err(_) => Err(ProbeError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        }
    }
}

/// Spawns and owns per-process probe loops.
pub struct HealthMonitor {
    prober: Arc<dyn Prober>,
    events: mpsc::Sender<(String, ProcessEvent)>,
}

impl HealthMonitor {
    pub fn new(prober: Arc<dyn Prober>, events: mpsc::Sender<(String, ProcessEvent)>) -> Self {
        Self { prober, events }
    }

    /// Start the probe loop for one process.
    ///
    /// The loop tracks a consecutive-failure streak and emits a
    /// `Health { healthy }` event only on transitions: the first success
    /// after start (or after a down period), and the crossing of the
    /// failure threshold. It stops on the broadcast shutdown signal; the
    /// supervisor also aborts the returned handle when the process leaves
    /// its live states.
    pub fn start_probing(
        &self,
        process: String,
        check: HealthCheckSpec,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let prober = Arc::clone(&self.prober);
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut consecutive_failures: u32 = 0;
            let mut reported_healthy: Option<bool> = None;
            let mut interval = tokio::time::interval(check.interval());

            info!(
                process = %process,
                interval_ms = check.interval_ms,
                failure_threshold = check.failure_threshold,
                "Started health probing"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match prober.probe(&check.probe, check.timeout()).await {
                            Ok(()) => {
                                if consecutive_failures > 0 {
                                    info!(
                                        process = %process,
                                        failures = consecutive_failures,
                                        "Probe recovered"
                                    );
                                }
                                consecutive_failures = 0;
                                if reported_healthy != Some(true) {
                                    reported_healthy = Some(true);
                                    if events
                                        .send((process.clone(), ProcessEvent::Health { healthy: true }))
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                            }
                            Err(err) => {
                                consecutive_failures += 1;
                                debug!(
                                    process = %process,
                                    consecutive_failures,
                                    error = %err,
                                    "Probe failed"
                                );
                                if consecutive_failures >= check.failure_threshold
                                    && reported_healthy != Some(false)
                                {
                                    warn!(
                                        process = %process,
                                        consecutive_failures,
                                        "Failure threshold reached, reporting unhealthy"
                                    );
                                    reported_healthy = Some(false);
                                    if events
                                        .send((process.clone(), ProcessEvent::Health { healthy: false }))
                                        .await
                                        .is_err()
                                    {
                                        break;
                                    }
                                }
                            }
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        debug!(process = %process, "Shutdown signal, stopping health probing");
                        break;
                    }
                }
            }
        })
    }
}
