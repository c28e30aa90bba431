//! Upload processor: drains the queue in time-ordered batches and applies the
//! retry policy.
//!
//! The batch size is also the concurrency bound; there is no queue depth
//! beyond one batch per tick. A failing item sleeps its retry delay inside
//! its batch slot before releasing it — that throttles chronically failing
//! items at the cost of holding the slot, a documented trade-off of this
//! pipeline rather than a bug.

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{BlobUploader, remote_name_for};
use crate::store::Store;
use crate::types::QueueItem;
use crate::utils::config::Settings;

pub struct UploadProcessor {
    store: Store,
    uploader: Arc<dyn BlobUploader>,
    container: String,
    retry_delay: Duration,
    delete_on_success: bool,
    archive_on_success: bool,
    archive_dir: Option<std::path::PathBuf>,
}

impl UploadProcessor {
    pub fn new(store: Store, uploader: Arc<dyn BlobUploader>, settings: &Settings) -> Self {
        Self {
            store,
            uploader,
            container: settings.container.clone(),
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            delete_on_success: settings.delete_on_success,
            archive_on_success: settings.archive_on_success,
            archive_dir: settings.archive_dir.clone(),
        }
    }

    /// Attempt up to `max_items` Pending items, oldest first, concurrently up
    /// to that same bound. Returns the number delivered.
    pub fn process_pending_batch(&self, max_items: usize) -> Result<usize> {
        if max_items == 0 {
            return Ok(0);
        }
        let batch = self.store.pending_batch(max_items)?;
        if batch.is_empty() {
            return Ok(0);
        }
        debug!("processing batch of {} item(s)", batch.len());

        let succeeded = AtomicUsize::new(0);
        rayon::scope(|s| {
            for item in batch {
                let succeeded = &succeeded;
                s.spawn(move |_| {
                    if self.process_item(item) {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        Ok(succeeded.load(Ordering::Relaxed))
    }

    /// One delivery attempt. Returns true on success; all failure paths are
    /// folded into the Pending/Failed retry machinery, never propagated.
    fn process_item(&self, item: QueueItem) -> bool {
        // Checked before the Uploading mark so a skipped item's row stays
        // untouched and it remains Pending for the next tick.
        if !self.uploader.is_reachable() {
            debug!("upload target unreachable, skipping item {}", item.id);
            return false;
        }

        if let Err(e) = self.store.mark_uploading(item.id) {
            error!("item {}: {e:#}", item.id);
            return false;
        }
        let attempt = item.attempts + 1;
        let started = Instant::now();
        let remote_name = remote_name_for(&item.source, &item.file_name, Utc::now());

        match self
            .uploader
            .upload(&item.path, &self.container, &remote_name)
        {
            Ok(receipt) => {
                let duration_ms = started.elapsed().as_millis() as i64;
                if let Err(e) = self.store.mark_completed(
                    item.id,
                    duration_ms,
                    &self.container,
                    &remote_name,
                    &receipt.url,
                ) {
                    error!("item {}: {e:#}", item.id);
                    return false;
                }
                info!(
                    "item {} delivered as {} in {duration_ms}ms",
                    item.id, remote_name
                );
                if let Err(e) = self.dispose_source(&item) {
                    warn!("item {}: post-success disposition failed: {e:#}", item.id);
                }
                true
            }
            Err(e) => {
                let message = format!("{e:#}");
                if attempt >= item.max_retries {
                    warn!(
                        "item {} failed terminally after {attempt} attempt(s): {message}",
                        item.id
                    );
                    if let Err(e) = self.store.mark_failed(item.id, &message) {
                        error!("item {}: {e:#}", item.id);
                    }
                } else {
                    warn!(
                        "item {} attempt {attempt}/{} failed: {message}",
                        item.id, item.max_retries
                    );
                    if let Err(e) = self.store.mark_retry(item.id, &message) {
                        error!("item {}: {e:#}", item.id);
                    }
                    std::thread::sleep(self.retry_delay);
                }
                false
            }
        }
    }

    /// Post-success disposition: delete wins over archive; otherwise the
    /// source file is left in place.
    fn dispose_source(&self, item: &QueueItem) -> Result<()> {
        if self.delete_on_success {
            std::fs::remove_file(&item.path)?;
            debug!("item {}: source file deleted", item.id);
        } else if self.archive_on_success
            && let Some(archive) = &self.archive_dir
        {
            std::fs::create_dir_all(archive)?;
            let dest = archive.join(&item.file_name);
            std::fs::rename(&item.path, &dest).or_else(|_| {
                // Cross-device moves fall back to copy + remove.
                std::fs::copy(&item.path, &dest)
                    .and_then(|_| std::fs::remove_file(&item.path))
                    .map(|_| ())
            })?;
            debug!("item {}: source file archived to {}", item.id, dest.display());
        }
        Ok(())
    }
}
