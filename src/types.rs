//! Public and internal types for the dockhand pipeline and store.

use chrono::Utc;
use std::path::PathBuf;

/// Current wall-clock time as unix milliseconds (the store's timestamp unit).
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Delivery state of a queue item.
///
/// `Pending`, `Processing`, and `Uploading` are non-terminal: an item in one of
/// these states blocks duplicates with the same fingerprint. `Completed` and
/// `Failed` are terminal and are never mutated again (audit trail).
/// Dockhand's own processor only writes `Uploading`; `Processing` is accepted
/// from rows written by external tooling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Processing,
    Uploading,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<UploadStatus> {
        match s {
            "pending" => Some(UploadStatus::Pending),
            "processing" => Some(UploadStatus::Processing),
            "uploading" => Some(UploadStatus::Uploading),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File type classified from extension. Drives structural validation:
/// JSON must parse, images must carry a recognizable header, `Other` is
/// accepted as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Json,
    Image,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Json => "json",
            FileKind::Image => "image",
            FileKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> FileKind {
        match s {
            "json" => FileKind::Json,
            "image" => FileKind::Image,
            _ => FileKind::Other,
        }
    }
}

/// One configured watched folder.
///
/// `name` is unique and serves as the watcher's identity key. A source with
/// `enabled == false` must have no live watcher; `needs_refresh` is set by the
/// registry writer and cleared by the orchestrator after a successful restart.
#[derive(Clone, Debug)]
pub struct DataSource {
    pub id: i64,
    pub name: String,
    pub folder: PathBuf,
    /// File-name glob pattern (e.g. `*.jpg`).
    pub pattern: String,
    pub enabled: bool,
    pub needs_refresh: bool,
    pub created_at_ms: i64,
    pub last_processed_at_ms: Option<i64>,
}

/// One file awaiting (or done with) delivery. Created by a folder watcher on
/// acceptance, mutated only by the upload processor, never deleted.
#[derive(Clone, Debug)]
pub struct QueueItem {
    pub id: i64,
    /// Name of the data source that accepted the file; used for remote naming.
    pub source: String,
    pub path: PathBuf,
    pub file_name: String,
    pub kind: FileKind,
    /// SHA-256 of the file bytes, computed once at enqueue time.
    pub fingerprint: [u8; 32],
    pub size: u64,
    pub status: UploadStatus,
    pub created_at_ms: i64,
    pub attempts: i64,
    pub max_retries: i64,
    pub last_attempt_at_ms: Option<i64>,
    pub last_error: Option<String>,
    pub completed_at_ms: Option<i64>,
    pub duration_ms: Option<i64>,
    pub remote_container: Option<String>,
    pub remote_name: Option<String>,
    pub remote_url: Option<String>,
}

/// Insert shape for a new queue item (status starts Pending, id assigned by the store).
#[derive(Clone, Debug)]
pub struct NewQueueItem {
    pub source: String,
    pub path: PathBuf,
    pub file_name: String,
    pub kind: FileKind,
    pub fingerprint: [u8; 32],
    pub size: u64,
    pub max_retries: i64,
}

/// Append-only diagnostic log entry written by a folder watcher on I/O or
/// validation exceptions. Advisory only; never mutated.
#[derive(Clone, Debug)]
pub struct WatcherErrorRecord {
    pub id: i64,
    pub source_id: i64,
    pub path: Option<String>,
    pub message: String,
    pub created_at_ms: i64,
}
