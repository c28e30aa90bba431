//! Data-source registry: the configs the orchestrator reconciles against.

use anyhow::{Context, Result};
use rusqlite::{Row, params};
use std::path::Path;

use super::Store;
use crate::types::{DataSource, now_ms};

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<DataSource> {
    Ok(DataSource {
        id: row.get(0)?,
        name: row.get(1)?,
        folder: std::path::PathBuf::from(row.get::<_, String>(2)?),
        pattern: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        needs_refresh: row.get::<_, i64>(5)? != 0,
        created_at_ms: row.get(6)?,
        last_processed_at_ms: row.get(7)?,
    })
}

const SOURCE_COLUMNS: &str =
    "id, name, folder, pattern, enabled, needs_refresh, created_at, last_processed_at";

impl Store {
    /// Register a new data source (enabled by default). `name` must be unique.
    pub fn add_source(&self, name: &str, folder: &Path, pattern: &str) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO data_sources (name, folder, pattern, enabled, needs_refresh, created_at) \
             VALUES (?1, ?2, ?3, 1, 0, ?4)",
            params![name, folder.to_string_lossy(), pattern, now_ms()],
        )
        .with_context(|| format!("add data source '{name}'"))?;
        Ok(conn.last_insert_rowid())
    }

    /// All configured data sources, stable order by name.
    pub fn list_sources(&self) -> Result<Vec<DataSource>> {
        let conn = self.lock();
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM data_sources ORDER BY name ASC");
        let mut stmt = conn.prepare(&sql).context("prepare source list")?;
        let rows = stmt.query_map([], source_from_row)?;
        let mut sources = Vec::new();
        for row in rows {
            sources.push(row.context("read data source")?);
        }
        Ok(sources)
    }

    /// Look up one source by its unique name.
    pub fn get_source(&self, name: &str) -> Result<Option<DataSource>> {
        let conn = self.lock();
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM data_sources WHERE name = ?1");
        let source = conn
            .prepare(&sql)?
            .query_row(params![name], source_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .with_context(|| format!("look up data source '{name}'"))?;
        Ok(source)
    }

    /// Enable or disable a source. Returns false when no such source exists.
    pub fn set_source_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let changed = self
            .lock()
            .execute(
                "UPDATE data_sources SET enabled = ?2 WHERE name = ?1",
                params![name, enabled as i64],
            )
            .with_context(|| format!("set enabled on '{name}'"))?;
        Ok(changed > 0)
    }

    /// Flag a source for restart on the next reconciliation tick.
    pub fn flag_refresh(&self, name: &str) -> Result<bool> {
        let changed = self
            .lock()
            .execute(
                "UPDATE data_sources SET needs_refresh = 1 WHERE name = ?1",
                params![name],
            )
            .with_context(|| format!("flag refresh on '{name}'"))?;
        Ok(changed > 0)
    }

    /// Cleared by the orchestrator once the restarted watcher is running.
    pub fn clear_refresh_flag(&self, id: i64) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE data_sources SET needs_refresh = 0 WHERE id = ?1",
                params![id],
            )
            .context("clear refresh flag")?;
        Ok(())
    }

    /// Stamp the source's last-processed time (written on each accepted file).
    pub fn touch_last_processed(&self, id: i64) -> Result<()> {
        self.lock()
            .execute(
                "UPDATE data_sources SET last_processed_at = ?2 WHERE id = ?1",
                params![id, now_ms()],
            )
            .context("touch last_processed_at")?;
        Ok(())
    }
}
