//! SQLite store: schema, shared handle, queue/source/log/heartbeat operations.
//!
//! The store is the only resource mutated by more than one component (watchers
//! append, the processor updates). A single connection behind a mutex
//! serializes conflicting writes; callers clone the [`Store`] handle freely.

mod heartbeat;
mod open;
mod queue;
mod sources;
mod watch_log;

pub use open::{open_store, open_store_in_memory};

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Schema for data sources, upload queue, watcher error log, and heartbeat.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS data_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    folder TEXT NOT NULL,
    pattern TEXT NOT NULL DEFAULT '*',
    enabled INTEGER NOT NULL DEFAULT 1,
    needs_refresh INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_processed_at INTEGER
);

CREATE TABLE IF NOT EXISTS upload_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    fingerprint BLOB NOT NULL,
    size INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL,
    last_attempt_at INTEGER,
    last_error TEXT,
    completed_at INTEGER,
    duration_ms INTEGER,
    remote_container TEXT,
    remote_name TEXT,
    remote_url TEXT
);
CREATE INDEX IF NOT EXISTS idx_queue_status_created ON upload_queue(status, created_at);
CREATE INDEX IF NOT EXISTS idx_queue_fingerprint ON upload_queue(fingerprint, status);

CREATE TABLE IF NOT EXISTS watcher_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    path TEXT,
    message TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS heartbeat (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    beat_at INTEGER NOT NULL
);
"#;

/// Insert statement for upload_queue rows.
pub(crate) const INSERT_ITEM_SQL: &str = "INSERT INTO upload_queue \
    (source, path, file_name, kind, fingerprint, size, status, created_at, attempts, max_retries) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, 0, ?8)";

/// Column list for reading upload_queue rows (keep in sync with `item_from_row`).
pub(crate) const ITEM_COLUMNS: &str = "id, source, path, file_name, kind, fingerprint, size, \
    status, created_at, attempts, max_retries, last_attempt_at, last_error, completed_at, \
    duration_ms, remote_container, remote_name, remote_url";

/// Shared handle to the dockhand database. Cheap to clone; all clones share
/// one connection, so writes to a given row can never interleave.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Lock the underlying connection. A poisoned mutex is recovered: the
    /// connection itself stays usable after a panicking holder.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}
