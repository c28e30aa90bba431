//! Upload queue operations: append, oldest-first selection, status updates,
//! indexed duplicate lookup, and counts.

use anyhow::{Context, Result, anyhow};
use rusqlite::{Row, params};

use super::{INSERT_ITEM_SQL, ITEM_COLUMNS, Store};
use crate::types::{FileKind, NewQueueItem, QueueItem, UploadStatus, now_ms};

/// Map one upload_queue row (selected with [`ITEM_COLUMNS`]) to a [`QueueItem`].
fn item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let kind: String = row.get(4)?;
    let fingerprint: Vec<u8> = row.get(5)?;
    let size: i64 = row.get(6)?;
    let status: String = row.get(7)?;
    let fingerprint: [u8; 32] = fingerprint.as_slice().try_into().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Blob,
            format!("fingerprint BLOB has {} byte(s), expected 32", fingerprint.len()).into(),
        )
    })?;
    Ok(QueueItem {
        id: row.get(0)?,
        source: row.get(1)?,
        path: std::path::PathBuf::from(row.get::<_, String>(2)?),
        file_name: row.get(3)?,
        kind: FileKind::parse(&kind),
        fingerprint,
        size: size.max(0) as u64,
        status: UploadStatus::parse(&status).unwrap_or(UploadStatus::Pending),
        created_at_ms: row.get(8)?,
        attempts: row.get(9)?,
        max_retries: row.get(10)?,
        last_attempt_at_ms: row.get(11)?,
        last_error: row.get(12)?,
        completed_at_ms: row.get(13)?,
        duration_ms: row.get(14)?,
        remote_container: row.get(15)?,
        remote_name: row.get(16)?,
        remote_url: row.get(17)?,
    })
}

impl Store {
    /// Append a new Pending item. Returns the assigned id.
    pub fn enqueue(&self, item: &NewQueueItem) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            INSERT_ITEM_SQL,
            params![
                item.source,
                item.path.to_string_lossy(),
                item.file_name,
                item.kind.as_str(),
                item.fingerprint.as_slice(),
                item.size as i64,
                now_ms(),
                item.max_retries,
            ],
        )
        .context("insert queue item")?;
        Ok(conn.last_insert_rowid())
    }

    /// Id of any non-terminal item with this fingerprint, if one exists.
    /// Backed by the (fingerprint, status) index; used for duplicate suppression.
    pub fn find_active_by_fingerprint(&self, fingerprint: &[u8; 32]) -> Result<Option<i64>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id FROM upload_queue \
                 WHERE fingerprint = ?1 AND status IN ('pending', 'processing', 'uploading') \
                 LIMIT 1",
            )
            .context("prepare duplicate lookup")?;
        let id = stmt
            .query_row(params![fingerprint.as_slice()], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("duplicate lookup")?;
        Ok(id)
    }

    /// Reset rows a crashed run left in Uploading back to Pending so the next
    /// tick retries them. Re-delivery is possible; the queue guarantees
    /// at-least-once, not exactly-once. Returns the number of rows reset.
    pub fn recover_interrupted_uploads(&self) -> Result<usize> {
        let n = self
            .lock()
            .execute(
                "UPDATE upload_queue SET status = 'pending', \
                 last_error = 'interrupted by shutdown' WHERE status = 'uploading'",
                [],
            )
            .context("recover interrupted uploads")?;
        Ok(n)
    }

    /// Up to `max_items` Pending items, oldest creation time first (FIFO fairness).
    pub fn pending_batch(&self, max_items: usize) -> Result<Vec<QueueItem>> {
        self.list_items(Some(UploadStatus::Pending), max_items)
    }

    /// Items filtered by status (or all), ordered by creation time.
    pub fn list_items(
        &self,
        status: Option<UploadStatus>,
        limit: usize,
    ) -> Result<Vec<QueueItem>> {
        let conn = self.lock();
        let sql = match status {
            Some(_) => format!(
                "SELECT {ITEM_COLUMNS} FROM upload_queue WHERE status = ?1 \
                 ORDER BY created_at ASC, id ASC LIMIT ?2"
            ),
            None => format!(
                "SELECT {ITEM_COLUMNS} FROM upload_queue \
                 ORDER BY created_at ASC, id ASC LIMIT ?1"
            ),
        };
        let mut stmt = conn.prepare(&sql).context("prepare item list")?;
        let rows = match status {
            Some(s) => stmt.query_map(params![s.as_str(), limit as i64], item_from_row)?,
            None => stmt.query_map(params![limit as i64], item_from_row)?,
        };
        let mut items = Vec::new();
        for row in rows {
            items.push(row.context("read queue item")?);
        }
        Ok(items)
    }

    /// Fetch one item by id.
    pub fn get_item(&self, id: i64) -> Result<QueueItem> {
        let conn = self.lock();
        let sql = format!("SELECT {ITEM_COLUMNS} FROM upload_queue WHERE id = ?1");
        conn.prepare(&sql)?
            .query_row(params![id], item_from_row)
            .with_context(|| format!("queue item {id} not found"))
    }

    /// Transition an item to Uploading: bump attempt count, stamp attempt time.
    pub fn mark_uploading(&self, id: i64) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE upload_queue SET status = 'uploading', \
                 attempts = attempts + 1, last_attempt_at = ?2 WHERE id = ?1",
                params![id, now_ms()],
            )
            .context("mark uploading")?;
        Ok(())
    }

    /// Terminal success: stamp completion time, duration, and remote location.
    pub fn mark_completed(
        &self,
        id: i64,
        duration_ms: i64,
        container: &str,
        remote_name: &str,
        remote_url: &str,
    ) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE upload_queue SET status = 'completed', completed_at = ?2, \
                 duration_ms = ?3, remote_container = ?4, remote_name = ?5, remote_url = ?6, \
                 last_error = NULL WHERE id = ?1",
                params![id, now_ms(), duration_ms, container, remote_name, remote_url],
            )
            .context("mark completed")?;
        Ok(())
    }

    /// Back to Pending with the failure recorded; eligible for the next tick.
    pub fn mark_retry(&self, id: i64, error: &str) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE upload_queue SET status = 'pending', last_error = ?2 WHERE id = ?1",
                params![id, error],
            )
            .context("mark retry")?;
        Ok(())
    }

    /// Terminal failure after the retry ceiling.
    pub fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE upload_queue SET status = 'failed', last_error = ?2 WHERE id = ?1",
                params![id, error],
            )
            .context("mark failed")?;
        Ok(())
    }

    /// Number of items currently in `status`.
    pub fn count_items(&self, status: UploadStatus) -> Result<i64> {
        self.lock()
            .query_row(
                "SELECT COUNT(*) FROM upload_queue WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )
            .context("count items")
    }

    /// (status, count) pairs for every status present in the queue.
    pub fn status_counts(&self) -> Result<Vec<(UploadStatus, i64)>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM upload_queue GROUP BY status")
            .context("prepare status counts")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            let (status, n) = row?;
            let status = UploadStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown status in queue: {status}"))?;
            counts.push((status, n));
        }
        Ok(counts)
    }
}
