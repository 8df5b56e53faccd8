//! File watcher that queues reloads when API definitions or policies change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::reload::ReloadQueue;

/// A watcher that monitors the definition directory and policy file.
pub struct ConfigWatcher {
    paths: Vec<PathBuf>,
    queue: ReloadQueue,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher over the given paths.
    ///
    /// Paths that do not exist are skipped when the watcher starts.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>, queue: ReloadQueue) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            queue,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let queue = self.queue.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(paths = ?event.paths, "Configuration change detected");
                        queue.trigger();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            if !Path::new(path).exists() {
                tracing::warn!(path = ?path, "Skipping watch on missing path");
                continue;
            }
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            tracing::info!(path = ?path, "Config watcher started");
        }

        Ok(watcher)
    }
}
