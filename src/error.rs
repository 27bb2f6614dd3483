//! Fatal supervisor errors.
//!
//! Anything that reaches [`SupervisorError`] aborts the run. Recoverable
//! failures (later fetches, later validations, reloads) and shutdown
//! failures are logged where they happen and never surface here.

use thiserror::Error;

use crate::config::{FetchError, SettingsError, ValidationError};
use crate::engine::{ControlError, SpawnError};
use crate::lifecycle::ShutdownReport;
use crate::proxy_mode::ProxyModeError;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to fetch initial config: {0}")]
    FirstFetch(#[source] FetchError),

    #[error("config watcher closed before delivering a config")]
    NoConfig,

    #[error("initial config rejected: {0}")]
    FirstValidation(#[source] ValidationError),

    #[error("failed to persist config to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start engine: {0}")]
    Spawn(#[source] SpawnError),

    #[error("failed to enable transparent proxy: {0}")]
    EnableProxy(#[source] ProxyModeError),

    #[error("failed to set up control client: {0}")]
    Control(#[from] ControlError),

    /// The engine died on its own; teardown already ran.
    #[error("engine exited unexpectedly: {status}")]
    EngineExited {
        status: String,
        report: ShutdownReport,
    },
}

impl SupervisorError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Settings(_) => "settings",
            SupervisorError::FirstFetch(_) => "first_fetch",
            SupervisorError::NoConfig => "no_config",
            SupervisorError::FirstValidation(_) => "first_validation",
            SupervisorError::Persist { .. } => "persist",
            SupervisorError::Spawn(_) => "spawn",
            SupervisorError::EnableProxy(_) => "enable_proxy",
            SupervisorError::Control(_) => "control_client",
            SupervisorError::EngineExited { .. } => "engine_exited",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SupervisorError::FirstFetch(FetchError::Status {
            url: "https://sub.example.com/clash".into(),
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(
            err.to_string(),
            "failed to fetch initial config: https://sub.example.com/clash returned status 500: boom"
        );
        assert_eq!(err.as_label(), "first_fetch");
        assert_eq!(SupervisorError::NoConfig.as_label(), "no_config");
    }
}
