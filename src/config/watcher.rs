//! Configuration source watcher.
//!
//! Produces the update sequence consumed by startup and hot reload:
//! the first snapshot is fetched before `start` returns, later snapshots
//! follow on every interval tick. Local sources are also watched with
//! `notify` so edits are picked up without waiting for the next tick.

use std::path::Path;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::source::{ConfigFetcher, ConfigSource, ConfigText, FetchError};
use crate::lifecycle::Shutdown;

/// Receiving half of the update channel.
pub type UpdateReceiver = mpsc::UnboundedReceiver<ConfigText>;

/// Periodic fetcher for the engine configuration.
pub struct ConfigWatcher {
    fetcher: ConfigFetcher,
    interval: Duration,
    update_tx: mpsc::UnboundedSender<ConfigText>,
    generation: u64,
}

impl ConfigWatcher {
    /// Fetch the first snapshot and start the background watch task.
    ///
    /// Returns once generation 1 is in the channel. A failed first fetch is
    /// returned to the caller and no task is spawned.
    pub async fn start(
        fetcher: ConfigFetcher,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Result<(UpdateReceiver, JoinHandle<()>), FetchError> {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let mut watcher = Self {
            fetcher,
            interval,
            update_tx,
            generation: 0,
        };

        let content = watcher.fetcher.fetch().await?;
        watcher.emit(content);

        tracing::info!(
            source = %watcher.fetcher.source(),
            interval_secs = interval.as_secs(),
            "Config watcher started"
        );

        let handle = tokio::spawn(watcher.run(shutdown));
        Ok((update_rx, handle))
    }

    async fn run(mut self, shutdown: Shutdown) {
        let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel();
        let _file_watcher = match self.fetcher.source() {
            ConfigSource::Local(path) => watch_file(path, trigger_tx),
            ConfigSource::Remote(_) => None,
        };

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                Some(()) = trigger_rx.recv() => {
                    tracing::debug!(source = %self.fetcher.source(), "Config file change detected");
                }
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                fetched = self.fetcher.fetch() => fetched,
            };

            match fetched {
                Ok(content) => {
                    if !self.emit(content) {
                        tracing::debug!("Update receiver dropped, stopping config watcher");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        source = %self.fetcher.source(),
                        error = %e,
                        "Failed to fetch config. Keeping current configuration."
                    );
                }
            }
        }

        tracing::info!("Config watcher stopped");
    }

    /// Push the next generation; false when nobody is listening anymore.
    fn emit(&mut self, content: String) -> bool {
        self.generation += 1;
        tracing::debug!(generation = self.generation, bytes = content.len(), "Config fetched");
        self.update_tx
            .send(ConfigText {
                generation: self.generation,
                content,
            })
            .is_ok()
    }
}

/// Watch a local file, sending a trigger on modify and create events.
fn watch_file(path: &Path, tx: mpsc::UnboundedSender<()>) -> Option<RecommendedWatcher> {
    let result = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(());
                }
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        },
        Config::default(),
    )
    .and_then(|mut watcher| {
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    match result {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "File watch unavailable, relying on interval polling"
            );
            None
        }
    }
}
