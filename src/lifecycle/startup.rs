//! Startup orchestration.
//!
//! # Responsibilities
//! - Acquire and validate the first configuration
//! - Persist it where the engine reads it
//! - Launch the engine, then enable redirection
//!
//! # Design Decisions
//! - Fail fast: every startup error is fatal
//! - Steps run in order, never concurrently
//! - Redirection is enabled last (traffic only once the engine is up)
//! - A failure after the engine spawn attempt still runs the shutdown
//!   sequence so nothing is left behind

use tokio::task::JoinHandle;

use crate::config::store::persist;
use crate::config::validation::validate;
use crate::config::{ConfigFetcher, ConfigWatcher, SupervisorConfig, UpdateReceiver, ValidatedConfig};
use crate::engine::{EngineLaunch, EngineProcess, PrivilegeDescriptor};
use crate::error::SupervisorError;
use crate::lifecycle::{Shutdown, ShutdownOrchestrator};
use crate::proxy_mode::ProxyMode;

/// Whether host-level redirection is currently installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Disabled,
    Enabled,
}

/// Everything the steady state needs once startup succeeded.
#[derive(Debug)]
pub struct Started {
    pub engine: EngineProcess,
    pub updates: UpdateReceiver,
    pub watcher: JoinHandle<()>,
    /// The configuration the engine was started with.
    pub applied: ValidatedConfig,
    pub proxy_state: ProxyState,
}

/// Run the startup sequence.
///
/// On failure the watcher is stopped through `shutdown`; failures after the
/// spawn attempt also run the shutdown sequence before returning.
pub async fn start<P: ProxyMode>(
    config: &SupervisorConfig,
    proxy_mode: &P,
    privileges: &PrivilegeDescriptor,
    shutdown: &Shutdown,
) -> Result<Started, SupervisorError> {
    let fetcher = ConfigFetcher::new(config.source()?, &config.headers()?, config.fetch_timeout())
        .map_err(SupervisorError::FirstFetch)?;

    let (mut updates, watcher) =
        ConfigWatcher::start(fetcher, config.check_interval(), shutdown.clone())
            .await
            .map_err(SupervisorError::FirstFetch)?;

    let Some(first) = updates.recv().await else {
        stop_watcher(shutdown, watcher).await;
        return Err(SupervisorError::NoConfig);
    };

    let applied = match validate(&first.content) {
        Ok(validated) => validated,
        Err(e) => {
            stop_watcher(shutdown, watcher).await;
            return Err(SupervisorError::FirstValidation(e));
        }
    };
    tracing::info!(
        generation = first.generation,
        controller = %applied.parsed.controller,
        fixed = applied.fixed,
        "Initial config accepted"
    );

    let config_path = config.internal_config_path();
    let prepared = async {
        tokio::fs::create_dir_all(&config.home).await?;
        persist(&config_path, &applied.text).await
    };
    if let Err(source) = prepared.await {
        stop_watcher(shutdown, watcher).await;
        return Err(SupervisorError::Persist {
            path: config_path.display().to_string(),
            source,
        });
    }

    let launch = EngineLaunch::from_config(config);
    let engine = match EngineProcess::spawn(&launch, privileges) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start engine process");
            stop_watcher(shutdown, watcher).await;
            ShutdownOrchestrator::new().run(proxy_mode, None).await;
            return Err(SupervisorError::Spawn(e));
        }
    };

    if let Err(e) = proxy_mode.enable().await {
        tracing::error!(error = %e, "Failed to enable transparent proxy");
        stop_watcher(shutdown, watcher).await;
        ShutdownOrchestrator::new().run(proxy_mode, Some(engine)).await;
        return Err(SupervisorError::EnableProxy(e));
    }
    tracing::info!("Transparent proxy enabled");

    Ok(Started {
        engine,
        updates,
        watcher,
        applied,
        proxy_state: ProxyState::Enabled,
    })
}

async fn stop_watcher(shutdown: &Shutdown, watcher: JoinHandle<()>) {
    shutdown.trigger();
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "Config watcher task failed");
    }
}
