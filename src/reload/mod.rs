//! Hot reload of the running engine.
//!
//! # Data Flow
//! ```text
//! UpdateReceiver (generation 2, 3, ...)
//!     → validate (auto-fix on failure)      invalid  → log, skip
//!     → compare with what is applied        same     → skip
//!     → persist to the internal path        failure  → log, skip
//!     → PUT /configs on the engine          failure  → log, retry next tick
//!     → applied
//! ```
//!
//! # Design Decisions
//! - One update at a time, each carried to completion before the next
//! - The request uses the controller and secret of the new configuration
//! - Nothing is rolled back on failure; the next snapshot decides

use std::path::PathBuf;

use crate::config::store::persist;
use crate::config::validation::validate;
use crate::config::{ConfigText, UpdateReceiver, ValidatedConfig};
use crate::engine::ControlClient;
use crate::lifecycle::Shutdown;

/// Result of handling one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Persisted and accepted by the engine.
    Applied,
    /// Same as what is already persisted and applied.
    Unchanged,
    Invalid,
    PersistFailed,
    RequestFailed,
}

/// Consumes later configuration snapshots and pushes them into the engine.
pub struct ReloadCoordinator {
    config_path: PathBuf,
    control: ControlClient,
    /// Last configuration the engine accepted.
    applied: ValidatedConfig,
    /// Text currently on disk at `config_path`.
    persisted: String,
}

impl ReloadCoordinator {
    /// `initial` must already be persisted and loaded by the engine.
    pub fn new(config_path: PathBuf, control: ControlClient, initial: ValidatedConfig) -> Self {
        let persisted = initial.text.clone();
        Self {
            config_path,
            control,
            applied: initial,
            persisted,
        }
    }

    pub fn applied(&self) -> &ValidatedConfig {
        &self.applied
    }

    pub fn persisted(&self) -> &str {
        &self.persisted
    }

    /// Process updates until shutdown or until the watcher goes away.
    pub async fn run(mut self, mut updates: UpdateReceiver, shutdown: Shutdown) -> Self {
        tracing::info!(path = %self.config_path.display(), "Reload coordinator started");

        loop {
            let update = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            self.handle(update).await;
        }

        tracing::info!("Reload coordinator stopped");
        self
    }

    /// Validate, persist and apply a single update.
    pub async fn handle(&mut self, update: ConfigText) -> ReloadOutcome {
        let generation = update.generation;

        let validated = match validate(&update.content) {
            Ok(validated) => validated,
            Err(e) => {
                tracing::error!(
                    generation,
                    error = %e,
                    "An error was detected in the config, skipping automatic reload"
                );
                return ReloadOutcome::Invalid;
            }
        };

        if validated.text == self.applied.text && validated.text == self.persisted {
            tracing::debug!(generation, "Config unchanged, nothing to reload");
            return ReloadOutcome::Unchanged;
        }

        tracing::info!(generation, fixed = validated.fixed, "Config changed, reloading");

        if let Err(e) = persist(&self.config_path, &validated.text).await {
            tracing::error!(
                generation,
                path = %self.config_path.display(),
                error = %e,
                "Failed to persist config"
            );
            return ReloadOutcome::PersistFailed;
        }
        self.persisted = validated.text.clone();

        let target = &validated.parsed;
        match self
            .control
            .reload(&target.controller, &target.secret, &self.config_path)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    generation,
                    controller = %target.controller,
                    "Config reload succeeded"
                );
                self.applied = validated;
                ReloadOutcome::Applied
            }
            Err(e) => {
                tracing::error!(
                    generation,
                    controller = %target.controller,
                    error = %e,
                    "Failed to reload config"
                );
                ReloadOutcome::RequestFailed
            }
        }
    }
}
