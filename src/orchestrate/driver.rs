//! Periodic driver loop: once per tick, reconcile watchers, drain an upload
//! batch, record the heartbeat. The inter-tick wait is cancellable; on
//! shutdown the loop finishes its current tick, then stops all watchers.

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::Orchestrator;
use crate::store::Store;
use crate::upload::{BlobUploader, UploadProcessor};
use crate::utils::config::Settings;

/// Channel pair for the cooperative shutdown signal.
pub fn shutdown_channel() -> (Sender<()>, Receiver<()>) {
    bounded(1)
}

/// Wire ctrl-c to the shutdown sender.
pub fn install_ctrlc(tx: Sender<()>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(())
}

/// Run the pipeline until `shutdown_rx` fires (or all senders drop).
pub fn run(
    store: Store,
    uploader: Arc<dyn BlobUploader>,
    settings: &Settings,
    shutdown_rx: Receiver<()>,
) -> Result<()> {
    let tick = Duration::from_secs(settings.tick_interval_secs);
    let batch_size = settings.max_concurrent_uploads;
    let mut orchestrator = Orchestrator::new(store.clone(), settings);
    let processor = UploadProcessor::new(store.clone(), uploader, settings);

    info!(
        "driver running: tick {}s, batch size {batch_size}",
        settings.tick_interval_secs
    );

    loop {
        // Per-tick failures are logged, never fatal; the next tick retries.
        if let Err(e) = orchestrator.reconcile() {
            warn!("reconciliation failed: {e:#}");
        }
        match processor.process_pending_batch(batch_size) {
            Ok(0) => {}
            Ok(n) => info!("{n} item(s) delivered this tick"),
            Err(e) => warn!("batch processing failed: {e:#}"),
        }
        if let Err(e) = store.record_heartbeat() {
            warn!("heartbeat failed: {e:#}");
        }

        match shutdown_rx.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("shutdown requested, stopping watchers");
    orchestrator.shutdown();
    Ok(())
}
