//! Folder watcher: one live instance per enabled data source.
//!
//! State machine is `Stopped → Running → Stopped`, nothing else. Start
//! validates (and creates) the directory, subscribes to create/modify
//! notifications recursively, then sweeps pre-existing files synchronously.
//! Per-file failures are caught and logged; they never stop the watcher.

pub mod debounce;

pub use debounce::DebounceWindow;

use anyhow::{Context, Result};
use glob::Pattern;
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use walkdir::WalkDir;

use crate::filter::{self, Verdict};
use crate::store::Store;
use crate::types::{DataSource, NewQueueItem};
use crate::utils::config::WatchConsts;

/// Everything the notification callback needs, shared between the event
/// thread and the sweep. Owned by the running watcher and dropped on stop.
struct WatchContext {
    source: DataSource,
    store: Store,
    pattern: Pattern,
    debounce: Mutex<DebounceWindow>,
    max_file_size: u64,
    max_retries: i64,
}

enum WatchState {
    Stopped,
    Running(WatchGuard),
}

/// Resources owned while running. Dropping the notify watcher unsubscribes;
/// dropping the context discards the debounce window.
struct WatchGuard {
    _watcher: RecommendedWatcher,
    _ctx: Arc<WatchContext>,
}

/// Watches one data source's folder and enqueues accepted files.
pub struct FolderWatcher {
    source: DataSource,
    store: Store,
    max_file_size: u64,
    max_retries: i64,
    // Serializes start against stop for this instance.
    state: Mutex<WatchState>,
}

impl FolderWatcher {
    pub fn new(source: DataSource, store: Store, max_file_size: u64, max_retries: i64) -> Self {
        Self {
            source,
            store,
            max_file_size,
            max_retries,
            state: Mutex::new(WatchState::Stopped),
        }
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(|e| e.into_inner()),
            WatchState::Running(_)
        )
    }

    /// Transition Stopped → Running: validate/create the directory, subscribe
    /// recursively, then sweep pre-existing files. On failure the watcher
    /// stays Stopped and the error is both recorded and returned.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let WatchState::Running(_) = *state {
            return Ok(());
        }

        match self.start_inner() {
            Ok(guard) => {
                *state = WatchState::Running(guard);
                info!(
                    "watcher '{}' running on {}",
                    self.source.name,
                    self.source.folder.display()
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.store.record_watcher_error(
                    self.source.id,
                    Some(&self.source.folder),
                    &format!("{e:#}"),
                );
                Err(e)
            }
        }
    }

    fn start_inner(&self) -> Result<WatchGuard> {
        let folder = &self.source.folder;
        std::fs::create_dir_all(folder)
            .with_context(|| format!("create watch directory {}", folder.display()))?;

        let pattern = Pattern::new(&self.source.pattern)
            .with_context(|| format!("bad glob pattern '{}'", self.source.pattern))?;

        let ctx = Arc::new(WatchContext {
            source: self.source.clone(),
            store: self.store.clone(),
            pattern,
            debounce: Mutex::new(DebounceWindow::new(
                Duration::from_secs(WatchConsts::DEBOUNCE_WINDOW_SECS),
                Duration::from_secs(WatchConsts::DEBOUNCE_MAX_AGE_SECS),
                Duration::from_secs(WatchConsts::DEBOUNCE_PURGE_INTERVAL_SECS),
            )),
            max_file_size: self.max_file_size,
            max_retries: self.max_retries,
        });

        let event_ctx = Arc::clone(&ctx);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        for path in &event.paths {
                            handle_path(&event_ctx, path);
                        }
                    }
                }
                Err(e) => {
                    // Notification subsystem errors don't stop the watcher;
                    // restart is the orchestrator's call on the next tick.
                    error!("watcher '{}': notify error: {e}", event_ctx.source.name);
                    let _ = event_ctx.store.record_watcher_error(
                        event_ctx.source.id,
                        None,
                        &format!("notify error: {e}"),
                    );
                }
            }
        })
        .context("create filesystem watcher")?;

        watcher
            .watch(folder, RecursiveMode::Recursive)
            .with_context(|| format!("subscribe to {}", folder.display()))?;

        // Synchronous sweep catches files that predate the subscription.
        sweep_dir(&ctx, folder);

        Ok(WatchGuard {
            _watcher: watcher,
            _ctx: ctx,
        })
    }

    /// Transition Running → Stopped: unsubscribe and discard debounce state.
    /// Stopping an already-stopped watcher is a no-op.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let WatchState::Running(guard) = std::mem::replace(&mut *state, WatchState::Stopped) {
            // Dropping the guard unsubscribes and frees the debounce window.
            drop(guard);
            info!("watcher '{}' stopped", self.source.name);
        }
    }
}

/// Route one notified path: directories are swept recursively, files go
/// through debounce and the filter.
fn handle_path(ctx: &Arc<WatchContext>, path: &Path) {
    if path.is_dir() {
        sweep_dir(ctx, path);
    } else {
        process_file(ctx, path);
    }
}

/// Enqueue every matching file under `dir`, paced so the filter and store are
/// not saturated by a large backlog.
fn sweep_dir(ctx: &Arc<WatchContext>, dir: &Path) {
    let pacing = Duration::from_millis(WatchConsts::SWEEP_PACING_MS);
    let mut first = true;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("watcher '{}': sweep error: {e}", ctx.source.name);
                let _ = ctx.store.record_watcher_error(
                    ctx.source.id,
                    e.path(),
                    &format!("sweep error: {e}"),
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !first {
            std::thread::sleep(pacing);
        }
        first = false;
        process_file(ctx, entry.path());
    }
}

/// Apply pattern, debounce, and the filter to one file; enqueue on acceptance.
/// Exceptions are caught here so the watcher keeps running.
fn process_file(ctx: &Arc<WatchContext>, path: &Path) {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_string(),
        None => return,
    };
    if !ctx.pattern.matches(&file_name) {
        debug!("'{}': {} does not match pattern", ctx.source.name, file_name);
        return;
    }
    {
        let mut debounce = ctx.debounce.lock().unwrap_or_else(|e| e.into_inner());
        if !debounce.should_process(path) {
            debug!("'{}': {} debounced", ctx.source.name, file_name);
            return;
        }
    }

    match filter::accept(path, &ctx.store, ctx.max_file_size) {
        Ok(Verdict::Accepted(accepted)) => {
            let item = NewQueueItem {
                source: ctx.source.name.clone(),
                path: path.to_path_buf(),
                file_name,
                kind: accepted.kind,
                fingerprint: accepted.fingerprint,
                size: accepted.size,
                max_retries: ctx.max_retries,
            };
            match ctx.store.enqueue(&item) {
                Ok(id) => {
                    info!(
                        "'{}': queued {} as item {id} ({} bytes)",
                        ctx.source.name,
                        path.display(),
                        accepted.size
                    );
                    if let Err(e) = ctx.store.touch_last_processed(ctx.source.id) {
                        warn!("'{}': {e:#}", ctx.source.name);
                    }
                }
                Err(e) => {
                    warn!("'{}': enqueue {} failed: {e:#}", ctx.source.name, path.display());
                    let _ = ctx.store.record_watcher_error(
                        ctx.source.id,
                        Some(path),
                        &format!("enqueue failed: {e:#}"),
                    );
                }
            }
        }
        Ok(Verdict::Rejected(reason)) => {
            debug!("'{}': {} rejected: {reason}", ctx.source.name, path.display());
        }
        Err(e) => {
            warn!(
                "'{}': processing {} failed: {e:#}",
                ctx.source.name,
                path.display()
            );
            let _ = ctx.store.record_watcher_error(
                ctx.source.id,
                Some(path),
                &format!("processing failed: {e:#}"),
            );
        }
    }
}
