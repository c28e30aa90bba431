//! Store tests: queue append/select/update, duplicate lookup, sources,
//! watcher error log, and heartbeat.

use dockhand::store::open_store_in_memory;
use dockhand::types::{FileKind, NewQueueItem, UploadStatus};
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;

fn new_item(name: &str, fingerprint: [u8; 32]) -> NewQueueItem {
    NewQueueItem {
        source: "cam1".to_string(),
        path: PathBuf::from(format!("/data/cam1/{name}")),
        file_name: name.to_string(),
        kind: FileKind::Other,
        fingerprint,
        size: 500 * 1024,
        max_retries: 3,
    }
}

fn fp(seed: u8) -> [u8; 32] {
    [seed; 32]
}

#[test]
fn test_enqueue_assigns_ids_and_pending_status() {
    let store = open_store_in_memory().unwrap();
    let a = store.enqueue(&new_item("a.jpg", fp(1))).unwrap();
    let b = store.enqueue(&new_item("b.jpg", fp(2))).unwrap();
    assert!(b > a);

    let item = store.get_item(a).unwrap();
    assert_eq!(item.status, UploadStatus::Pending);
    assert_eq!(item.attempts, 0);
    assert_eq!(item.fingerprint, fp(1));
    assert_eq!(item.source, "cam1");
    assert!(item.last_attempt_at_ms.is_none());
}

#[test]
fn test_pending_batch_is_oldest_first_and_bounded() {
    let store = open_store_in_memory().unwrap();
    for i in 0..5u8 {
        store
            .enqueue(&new_item(&format!("f{i}.jpg"), fp(i)))
            .unwrap();
        sleep(Duration::from_millis(5)); // distinct created_at stamps
    }

    let batch = store.pending_batch(3).unwrap();
    assert_eq!(batch.len(), 3);
    let names: Vec<&str> = batch.iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(names, vec!["f0.jpg", "f1.jpg", "f2.jpg"]);
}

#[test]
fn test_duplicate_lookup_only_sees_non_terminal_items() {
    let store = open_store_in_memory().unwrap();
    let id = store.enqueue(&new_item("a.jpg", fp(7))).unwrap();
    assert_eq!(store.find_active_by_fingerprint(&fp(7)).unwrap(), Some(id));
    assert_eq!(store.find_active_by_fingerprint(&fp(8)).unwrap(), None);

    store.mark_uploading(id).unwrap();
    assert_eq!(store.find_active_by_fingerprint(&fp(7)).unwrap(), Some(id));

    store
        .mark_completed(id, 12, "ingest", "cam1/x", "file:///x")
        .unwrap();
    assert_eq!(store.find_active_by_fingerprint(&fp(7)).unwrap(), None);
}

#[test]
fn test_mark_uploading_bumps_attempts_and_stamps_time() {
    let store = open_store_in_memory().unwrap();
    let id = store.enqueue(&new_item("a.jpg", fp(1))).unwrap();

    store.mark_uploading(id).unwrap();
    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Uploading);
    assert_eq!(item.attempts, 1);
    assert!(item.last_attempt_at_ms.is_some());

    store.mark_retry(id, "network error").unwrap();
    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Pending);
    assert_eq!(item.attempts, 1);
    assert_eq!(item.last_error.as_deref(), Some("network error"));

    store.mark_uploading(id).unwrap();
    assert_eq!(store.get_item(id).unwrap().attempts, 2);
}

#[test]
fn test_mark_completed_records_remote_location() {
    let store = open_store_in_memory().unwrap();
    let id = store.enqueue(&new_item("a.jpg", fp(1))).unwrap();
    store.mark_uploading(id).unwrap();
    store
        .mark_completed(id, 42, "ingest", "cam1/20250101/a.jpg", "file:///up/a.jpg")
        .unwrap();

    let item = store.get_item(id).unwrap();
    assert_eq!(item.status, UploadStatus::Completed);
    assert!(item.completed_at_ms.is_some());
    assert_eq!(item.duration_ms, Some(42));
    assert_eq!(item.remote_container.as_deref(), Some("ingest"));
    assert_eq!(item.remote_name.as_deref(), Some("cam1/20250101/a.jpg"));
    assert_eq!(item.remote_url.as_deref(), Some("file:///up/a.jpg"));
}

#[test]
fn test_status_counts_and_count_items() {
    let store = open_store_in_memory().unwrap();
    let a = store.enqueue(&new_item("a.jpg", fp(1))).unwrap();
    store.enqueue(&new_item("b.jpg", fp(2))).unwrap();
    store.mark_failed(a, "boom").unwrap();

    assert_eq!(store.count_items(UploadStatus::Pending).unwrap(), 1);
    assert_eq!(store.count_items(UploadStatus::Failed).unwrap(), 1);

    let counts = store.status_counts().unwrap();
    assert!(counts.contains(&(UploadStatus::Pending, 1)));
    assert!(counts.contains(&(UploadStatus::Failed, 1)));
}

#[test]
fn test_sources_crud_and_flags() {
    let store = open_store_in_memory().unwrap();
    let id = store
        .add_source("cam1", std::path::Path::new("/data/cam1"), "*.jpg")
        .unwrap();

    // name is unique
    assert!(
        store
            .add_source("cam1", std::path::Path::new("/elsewhere"), "*")
            .is_err()
    );

    let sources = store.list_sources().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name, "cam1");
    assert_eq!(sources[0].pattern, "*.jpg");
    assert!(sources[0].enabled);
    assert!(!sources[0].needs_refresh);

    assert!(store.set_source_enabled("cam1", false).unwrap());
    assert!(!store.get_source("cam1").unwrap().unwrap().enabled);
    assert!(!store.set_source_enabled("ghost", false).unwrap());

    assert!(store.flag_refresh("cam1").unwrap());
    assert!(store.get_source("cam1").unwrap().unwrap().needs_refresh);
    store.clear_refresh_flag(id).unwrap();
    assert!(!store.get_source("cam1").unwrap().unwrap().needs_refresh);

    assert!(
        store
            .get_source("cam1")
            .unwrap()
            .unwrap()
            .last_processed_at_ms
            .is_none()
    );
    store.touch_last_processed(id).unwrap();
    assert!(
        store
            .get_source("cam1")
            .unwrap()
            .unwrap()
            .last_processed_at_ms
            .is_some()
    );
}

#[test]
fn test_watcher_error_log_is_append_only_per_source() {
    let store = open_store_in_memory().unwrap();
    store
        .record_watcher_error(1, Some(std::path::Path::new("/data/x.jpg")), "read failed")
        .unwrap();
    store.record_watcher_error(1, None, "notify error").unwrap();
    store.record_watcher_error(2, None, "other source").unwrap();

    let records = store.list_watcher_errors(1).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, "read failed");
    assert_eq!(records[0].path.as_deref(), Some("/data/x.jpg"));
    assert_eq!(records[1].path, None);
}

#[test]
fn test_heartbeat_single_row_upsert() {
    let store = open_store_in_memory().unwrap();
    assert_eq!(store.last_heartbeat_ms().unwrap(), None);

    store.record_heartbeat().unwrap();
    let first = store.last_heartbeat_ms().unwrap().unwrap();

    sleep(Duration::from_millis(5));
    store.record_heartbeat().unwrap();
    let second = store.last_heartbeat_ms().unwrap().unwrap();
    assert!(second >= first);
}
