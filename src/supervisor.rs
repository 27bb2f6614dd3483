//! Runtime supervisor.
//!
//! Sequences startup, the steady state and shutdown:
//!
//! ```text
//! startup ──▶ steady state ─────────────────────────▶ shutdown
//!             ├ watcher task:  fetch every interval   (disable → terminate)
//!             ├ reload task:   apply later configs
//!             └ main:          wait for the token or
//!                              an unexpected engine exit
//! ```
//!
//! The shutdown sequence starts only after the reload task has finished its
//! current update, so an in-flight control call completes or times out first.

use std::sync::Arc;

use crate::config::SupervisorConfig;
use crate::engine::{ControlClient, PrivilegeDescriptor};
use crate::error::SupervisorError;
use crate::lifecycle::startup::{self, Started};
use crate::lifecycle::{Shutdown, ShutdownOrchestrator, ShutdownReport};
use crate::proxy_mode::ProxyMode;
use crate::reload::ReloadCoordinator;

pub struct Supervisor<P> {
    config: Arc<SupervisorConfig>,
    proxy_mode: P,
    privileges: PrivilegeDescriptor,
}

impl<P: ProxyMode> Supervisor<P> {
    pub fn new(config: SupervisorConfig, proxy_mode: P, privileges: PrivilegeDescriptor) -> Self {
        Self {
            config: Arc::new(config),
            proxy_mode,
            privileges,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run until `shutdown` fires, then tear down.
    ///
    /// Returns the shutdown report after a requested shutdown. Startup
    /// failures and an engine that exits on its own are errors.
    pub async fn run(self, shutdown: Shutdown) -> Result<ShutdownReport, SupervisorError> {
        self.config.validate()?;
        tracing::info!(
            home = %self.config.home.display(),
            source = %self.config.config,
            ui = %self.config.ui,
            check_interval_secs = self.config.check_interval_secs,
            disable_extract = self.config.disable_extract,
            "Starting tpclash"
        );

        let control = ControlClient::new(self.config.control_timeout())?;

        let Started {
            mut engine,
            updates,
            watcher,
            applied,
            proxy_state,
        } = startup::start(&self.config, &self.proxy_mode, &self.privileges, &shutdown).await?;

        let coordinator =
            ReloadCoordinator::new(self.config.internal_config_path(), control, applied);
        let reloader = tokio::spawn(coordinator.run(updates, shutdown.clone()));

        tracing::info!(pid = ?engine.pid(), proxy = ?proxy_state, "tpclash is ready");

        let crashed = tokio::select! {
            _ = shutdown.cancelled() => None,
            status = engine.wait_exit() => {
                let status = match status {
                    Ok(status) => status.to_string(),
                    Err(e) => format!("lost track of engine process: {e}"),
                };
                tracing::error!(status = %status, "Engine exited unexpectedly");
                shutdown.trigger();
                Some(status)
            }
        };

        if let Err(e) = reloader.await {
            tracing::warn!(error = %e, "Reload coordinator task failed");
        }
        if let Err(e) = watcher.await {
            tracing::warn!(error = %e, "Config watcher task failed");
        }

        let report = ShutdownOrchestrator::new()
            .run(&self.proxy_mode, Some(engine))
            .await;

        match crashed {
            Some(status) => Err(SupervisorError::EngineExited { status, report }),
            None => Ok(report),
        }
    }
}
