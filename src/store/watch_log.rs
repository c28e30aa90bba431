//! Append-only watcher error log (advisory diagnostics per data source).

use anyhow::{Context, Result};
use rusqlite::params;
use std::path::Path;

use super::Store;
use crate::types::{WatcherErrorRecord, now_ms};

impl Store {
    /// Append one error record for a data source. Never mutated afterwards.
    pub fn record_watcher_error(
        &self,
        source_id: i64,
        path: Option<&Path>,
        message: &str,
    ) -> Result<()> {
        self.lock()
            .execute(
                "INSERT INTO watcher_errors (source_id, path, message, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    source_id,
                    path.map(|p| p.to_string_lossy().into_owned()),
                    message,
                    now_ms()
                ],
            )
            .context("record watcher error")?;
        Ok(())
    }

    /// Error records for one source, oldest first.
    pub fn list_watcher_errors(&self, source_id: i64) -> Result<Vec<WatcherErrorRecord>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, source_id, path, message, created_at FROM watcher_errors \
                 WHERE source_id = ?1 ORDER BY id ASC",
            )
            .context("prepare watcher error list")?;
        let rows = stmt.query_map(params![source_id], |row| {
            Ok(WatcherErrorRecord {
                id: row.get(0)?,
                source_id: row.get(1)?,
                path: row.get(2)?,
                message: row.get(3)?,
                created_at_ms: row.get(4)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("read watcher error")?);
        }
        Ok(records)
    }
}
