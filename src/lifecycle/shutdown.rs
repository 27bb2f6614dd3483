//! Shutdown coordination for the supervisor.

use std::fmt;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::engine::EngineProcess;
use crate::proxy_mode::ProxyMode;

/// Process-wide cancellation signal.
///
/// Cloned into every long-running task; any clone can trigger it and all
/// clones observe it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the shutdown signal has been triggered.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Steps of the shutdown sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Disabling,
    Terminating,
    Stopped,
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Disabling => "disabling",
            ShutdownPhase::Terminating => "terminating",
            ShutdownPhase::Stopped => "stopped",
        })
    }
}

/// What happened during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every phase visited, starting with `Running`.
    pub phases: Vec<ShutdownPhase>,
    pub disable_error: Option<String>,
    pub terminate_error: Option<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.disable_error.is_none() && self.terminate_error.is_none()
    }
}

/// Runs `Running → Disabling → Terminating → Stopped`, best-effort.
#[derive(Debug)]
pub struct ShutdownOrchestrator {
    phase: ShutdownPhase,
    report: ShutdownReport,
}

impl Default for ShutdownOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownOrchestrator {
    pub fn new() -> Self {
        Self {
            phase: ShutdownPhase::Running,
            report: ShutdownReport {
                phases: vec![ShutdownPhase::Running],
                disable_error: None,
                terminate_error: None,
            },
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    /// Disable redirection, then terminate the engine if there is one.
    pub async fn run<P: ProxyMode>(
        mut self,
        proxy_mode: &P,
        engine: Option<EngineProcess>,
    ) -> ShutdownReport {
        tracing::info!("Stopping tpclash");

        self.transition(ShutdownPhase::Disabling);
        match proxy_mode.disable().await {
            Ok(()) => tracing::info!("Transparent proxy disabled"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to disable transparent proxy");
                self.report.disable_error = Some(e.to_string());
            }
        }

        self.transition(ShutdownPhase::Terminating);
        match engine {
            Some(engine) => {
                if let Err(e) = engine.terminate().await {
                    tracing::error!(error = %e, "Failed to terminate engine");
                    self.report.terminate_error = Some(e.to_string());
                }
            }
            None => tracing::debug!("No engine process to terminate"),
        }

        self.transition(ShutdownPhase::Stopped);
        tracing::info!(clean = self.report.is_clean(), "tpclash stopped");
        self.report
    }

    fn transition(&mut self, next: ShutdownPhase) {
        tracing::debug!(from = %self.phase, to = %next, "Shutdown phase");
        self.phase = next;
        self.report.phases.push(next);
    }
}
