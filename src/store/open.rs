//! Open the dockhand database (file or in-memory) and ensure schema + WAL.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

use super::{SCHEMA, Store, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

/// Open or create the store at `path`. Failure here is the one error that is
/// fatal to the host process. Rows left in Uploading by an interrupted run
/// are re-queued here so they cannot wedge (and block duplicates) forever.
pub fn open_store(path: &Path) -> Result<Store> {
    let conn = Connection::open(path)
        .with_context(|| format!("open database at {}", path.display()))?;
    apply_wal_and_schema(&conn)?;
    let store = Store::new(conn);
    let requeued = store.recover_interrupted_uploads()?;
    if requeued > 0 {
        log::info!("re-queued {requeued} upload(s) interrupted by a previous run");
    }
    Ok(store)
}

/// Open an in-memory store with the same schema (tests and dry runs; no WAL pragmas needed).
pub fn open_store_in_memory() -> Result<Store> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(Store::new(conn))
}
