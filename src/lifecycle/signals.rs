//! OS signal handling.
//!
//! Interrupt, terminate and hangup all request the same graceful shutdown.
//! Handlers are registered synchronously by [`SignalListener::install`] so
//! that a signal arriving during startup is not lost.

use std::fmt;
use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Signals that end the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Hangup => "SIGHUP",
        })
    }
}

/// Registered termination signal handlers.
#[cfg(unix)]
pub struct SignalListener {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    /// Register the handlers. Must be called inside a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            _ = self.sigint.recv() => TerminationSignal::Interrupt,
            _ = self.sigterm.recv() => TerminationSignal::Terminate,
            _ = self.sighup.recv() => TerminationSignal::Hangup,
        }
    }
}

/// Registered termination signal handlers.
#[cfg(not(unix))]
pub struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> TerminationSignal {
        let _ = tokio::signal::ctrl_c().await;
        TerminationSignal::Interrupt
    }
}

impl SignalListener {
    /// Trigger `shutdown` on the first termination signal.
    pub fn spawn(mut self, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                signal = self.recv() => {
                    tracing::info!(signal = %signal, "Shutdown signal received");
                    shutdown.trigger();
                }
                _ = shutdown.cancelled() => {}
            }
        })
    }
}
