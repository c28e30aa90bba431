//! Upload processor tests: success disposition, retry ceiling, unreachable
//! skip, and batch fairness — all through a mock uploader behind the
//! BlobUploader seam.

use dockhand::store::{Store, open_store, open_store_in_memory};
use dockhand::types::{FileKind, NewQueueItem, UploadStatus};
use dockhand::upload::{BlobUploader, UploadProcessor, UploadReceipt};
use dockhand::utils::config::Settings;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

struct MockUploader {
    reachable: AtomicBool,
    fail_always: bool,
    uploads: Mutex<Vec<String>>,
}

impl MockUploader {
    fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            fail_always: false,
            uploads: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail_always: true,
            ..Self::new()
        }
    }

    fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

impl BlobUploader for MockUploader {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    fn upload(&self, _local: &Path, _container: &str, remote_name: &str) -> anyhow::Result<UploadReceipt> {
        if self.fail_always {
            anyhow::bail!("connection reset by peer");
        }
        self.uploads.lock().unwrap().push(remote_name.to_string());
        Ok(UploadReceipt {
            url: format!("mock://{remote_name}"),
        })
    }
}

fn test_settings() -> Settings {
    Settings {
        retry_delay_secs: 0, // keep failure-path tests fast
        ..Settings::default()
    }
}

fn enqueue_file(store: &Store, dir: &Path, name: &str, content: &[u8], max_retries: i64) -> i64 {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    store
        .enqueue(&NewQueueItem {
            source: "cam1".to_string(),
            path,
            file_name: name.to_string(),
            kind: FileKind::Other,
            fingerprint: {
                let mut fp = [0u8; 32];
                let bytes = name.as_bytes();
                fp[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
                fp
            },
            size: content.len() as u64,
            max_retries,
        })
        .unwrap()
}

#[test]
fn test_successful_upload_completes_item_and_deletes_source() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(MockUploader::new());
    let settings = Settings {
        delete_on_success: true,
        ..test_settings()
    };
    let processor = UploadProcessor::new(store.clone(), uploader.clone(), &settings);

    let id = enqueue_file(&store, dir.path(), "a.jpg", &[1u8; 512], 3);
    let delivered = processor.process_pending_batch(4).unwrap();
    assert_eq!(delivered, 1);

    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Completed);
    assert_eq!(item.attempts, 1);
    assert!(item.completed_at_ms.is_some());
    assert!(item.duration_ms.is_some());
    let remote = item.remote_name.unwrap();
    assert!(remote.starts_with("cam1/"));
    assert!(remote.ends_with("_a.jpg"));
    assert_eq!(item.remote_url.as_deref(), Some(format!("mock://{remote}").as_str()));

    assert!(!dir.path().join("a.jpg").exists());
    assert_eq!(uploader.uploaded().len(), 1);
}

#[test]
fn test_archive_on_success_moves_source() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("archive");
    let settings = Settings {
        archive_on_success: true,
        archive_dir: Some(archive.clone()),
        ..test_settings()
    };
    let processor = UploadProcessor::new(store.clone(), Arc::new(MockUploader::new()), &settings);

    enqueue_file(&store, dir.path(), "keep.bin", b"payload", 3);
    assert_eq!(processor.process_pending_batch(1).unwrap(), 1);

    assert!(!dir.path().join("keep.bin").exists());
    assert!(archive.join("keep.bin").exists());
}

#[test]
fn test_retry_ceiling_reaches_failed_with_exact_attempts() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let processor =
        UploadProcessor::new(store.clone(), Arc::new(MockUploader::failing()), &test_settings());

    let id = enqueue_file(&store, dir.path(), "doomed.bin", b"x", 3);

    // Tick 1 and 2: re-queued Pending with the error recorded.
    for expected_attempts in 1..=2 {
        assert_eq!(processor.process_pending_batch(4).unwrap(), 0);
        let item = store.get_item(id).unwrap();
        assert_eq!(item.status, UploadStatus::Pending);
        assert_eq!(item.attempts, expected_attempts);
        assert!(item.last_error.as_deref().unwrap().contains("connection reset"));
    }

    // Tick 3: ceiling reached, terminally Failed.
    assert_eq!(processor.process_pending_batch(4).unwrap(), 0);
    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Failed);
    assert_eq!(item.attempts, 3);

    // Further ticks never touch the terminal item.
    assert_eq!(processor.process_pending_batch(4).unwrap(), 0);
    assert_eq!(store.get_item(id).unwrap().attempts, 3);
}

#[test]
fn test_unreachable_target_skips_without_consuming_a_retry() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(MockUploader::new());
    uploader.reachable.store(false, Ordering::Relaxed);
    let processor = UploadProcessor::new(store.clone(), uploader.clone(), &test_settings());

    let id = enqueue_file(&store, dir.path(), "waiting.bin", b"x", 3);
    assert_eq!(processor.process_pending_batch(4).unwrap(), 0);

    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Pending);
    assert_eq!(item.attempts, 0);
    assert!(item.last_attempt_at_ms.is_none());

    // Once reachable again, the same item goes through.
    uploader.reachable.store(true, Ordering::Relaxed);
    assert_eq!(processor.process_pending_batch(4).unwrap(), 1);
    assert_eq!(store.get_item(id).unwrap().status, UploadStatus::Completed);
}

#[test]
fn test_batch_selects_the_oldest_items() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let uploader = Arc::new(MockUploader::new());
    let processor = UploadProcessor::new(store.clone(), uploader.clone(), &test_settings());

    for i in 0..5 {
        enqueue_file(&store, dir.path(), &format!("f{i}.bin"), &[i as u8 + 1; 8], 3);
        sleep(Duration::from_millis(5)); // distinct created_at stamps
    }

    assert_eq!(processor.process_pending_batch(3).unwrap(), 3);
    let mut delivered = uploader.uploaded();
    delivered.sort();
    assert_eq!(delivered.len(), 3);
    assert!(delivered[0].ends_with("_f0.bin"));
    assert!(delivered[1].ends_with("_f1.bin"));
    assert!(delivered[2].ends_with("_f2.bin"));
    assert_eq!(store.count_items(UploadStatus::Pending).unwrap(), 2);
}

#[test]
fn test_missing_source_file_fails_like_any_upload_failure() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let upload_root = dir.path().join("remote");
    std::fs::create_dir_all(&upload_root).unwrap();
    let settings = test_settings();
    let processor = UploadProcessor::new(
        store.clone(),
        Arc::new(dockhand::upload::DirUploader::new(upload_root)),
        &settings,
    );

    let id = enqueue_file(&store, dir.path(), "vanishing.bin", b"x", 2);
    std::fs::remove_file(dir.path().join("vanishing.bin")).unwrap();

    assert_eq!(processor.process_pending_batch(4).unwrap(), 0);
    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Pending);
    assert_eq!(item.attempts, 1);
    assert!(item.last_error.is_some());

    assert_eq!(processor.process_pending_batch(4).unwrap(), 0);
    assert_eq!(store.get_item(id).unwrap().status, UploadStatus::Failed);
}

#[test]
fn test_interrupted_upload_is_requeued_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("dockhand.db");

    // A run that crashed mid-upload leaves the row in Uploading.
    let store = open_store(&db).unwrap();
    let id = enqueue_file(&store, dir.path(), "caught.bin", b"payload", 3);
    store.mark_uploading(id).unwrap();
    drop(store);

    // Reopening resets it to Pending so the next tick retries it.
    let store = open_store(&db).unwrap();
    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Pending);
    assert_eq!(item.attempts, 1);
    assert!(item.last_error.as_deref().unwrap().contains("interrupted"));

    let uploader = Arc::new(MockUploader::new());
    let processor = UploadProcessor::new(store.clone(), uploader, &test_settings());
    assert_eq!(processor.process_pending_batch(4).unwrap(), 1);
    assert_eq!(store.get_item(id).unwrap().status, UploadStatus::Completed);

    // Identical content dropped again is no longer blocked as a duplicate.
    assert_eq!(
        store
            .find_active_by_fingerprint(&store.get_item(id).unwrap().fingerprint)
            .unwrap(),
        None
    );
}

#[test]
fn test_every_queued_item_ends_terminal() {
    let store = open_store_in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let upload_root = dir.path().join("remote");
    std::fs::create_dir_all(&upload_root).unwrap();
    let processor = UploadProcessor::new(
        store.clone(),
        Arc::new(dockhand::upload::DirUploader::new(upload_root)),
        &test_settings(),
    );

    let good = enqueue_file(&store, dir.path(), "good.bin", b"ok", 2);
    let doomed = enqueue_file(&store, dir.path(), "gone.bin", b"xx", 2);
    std::fs::remove_file(dir.path().join("gone.bin")).unwrap();

    for _ in 0..4 {
        processor.process_pending_batch(4).unwrap();
    }
    assert_eq!(store.get_item(good).unwrap().status, UploadStatus::Completed);
    assert_eq!(store.get_item(doomed).unwrap().status, UploadStatus::Failed);
    assert_eq!(store.count_items(UploadStatus::Pending).unwrap(), 0);
    assert_eq!(store.count_items(UploadStatus::Uploading).unwrap(), 0);
}
