//! Watcher orchestrator: reconciles live watchers against the data-source
//! registry once per tick.
//!
//! The active-watcher table is owned exclusively by the orchestrator (single
//! writer); watcher start/stop failures are caught per source and never block
//! reconciliation of the others.

pub mod driver;

pub use driver::{install_ctrlc, run, shutdown_channel};

use anyhow::Result;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::Store;
use crate::types::DataSource;
use crate::utils::config::Settings;
use crate::watch::FolderWatcher;

/// In-memory binding of a data-source name to its running watcher. Exists
/// only while the watcher is live.
struct ActiveWatcher {
    watcher: Arc<FolderWatcher>,
}

pub struct Orchestrator {
    store: Store,
    max_file_size: u64,
    max_retries: i64,
    active: HashMap<String, ActiveWatcher>,
}

impl Orchestrator {
    pub fn new(store: Store, settings: &Settings) -> Self {
        Self {
            store,
            max_file_size: settings.max_file_size_bytes,
            max_retries: settings.max_retries as i64,
            active: HashMap::new(),
        }
    }

    /// One reconciliation pass: after it, the active set equals the set of
    /// currently-enabled configs (refresh-flagged watchers are restarted and
    /// their flag cleared).
    pub fn reconcile(&mut self) -> Result<()> {
        let sources = self.store.list_sources()?;
        let by_name: HashMap<&str, &DataSource> =
            sources.iter().map(|s| (s.name.as_str(), s)).collect();

        // Stop watchers whose config is gone or disabled.
        let stale: Vec<String> = self
            .active
            .keys()
            .filter(|name| {
                by_name
                    .get(name.as_str())
                    .is_none_or(|source| !source.enabled)
            })
            .cloned()
            .collect();
        for name in stale {
            if let Some(entry) = self.active.remove(&name) {
                entry.watcher.stop();
                info!("removed watcher '{name}'");
            }
        }

        for source in &sources {
            if !source.enabled {
                continue;
            }
            let tracked = self.active.contains_key(&source.name);
            if tracked && source.needs_refresh {
                if let Some(entry) = self.active.remove(&source.name) {
                    entry.watcher.stop();
                }
                match self.start_watcher(source) {
                    Ok(()) => {
                        if let Err(e) = self.store.clear_refresh_flag(source.id) {
                            warn!("'{}': {e:#}", source.name);
                        }
                        info!("restarted watcher '{}'", source.name);
                    }
                    Err(e) => error!("restart of watcher '{}' failed: {e:#}", source.name),
                }
            } else if !tracked {
                match self.start_watcher(source) {
                    Ok(()) => {
                        // A flag set while no watcher was live (e.g. while the
                        // daemon was down) is satisfied by this fresh start.
                        if source.needs_refresh
                            && let Err(e) = self.store.clear_refresh_flag(source.id)
                        {
                            warn!("'{}': {e:#}", source.name);
                        }
                    }
                    Err(e) => error!("start of watcher '{}' failed: {e:#}", source.name),
                }
            }
        }
        Ok(())
    }

    fn start_watcher(&mut self, source: &DataSource) -> Result<()> {
        let watcher = Arc::new(FolderWatcher::new(
            source.clone(),
            self.store.clone(),
            self.max_file_size,
            self.max_retries,
        ));
        watcher.start()?;
        self.active
            .insert(source.name.clone(), ActiveWatcher { watcher });
        Ok(())
    }

    /// Names of currently-live watchers, sorted.
    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop all active watchers and clear the table. Order is unspecified.
    pub fn shutdown(&mut self) {
        for (name, entry) in self.active.drain() {
            entry.watcher.stop();
            info!("stopped watcher '{name}'");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
