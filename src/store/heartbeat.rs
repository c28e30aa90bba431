//! Single-row liveness timestamp, written once per driver tick.

use anyhow::{Context, Result};
use rusqlite::params;

use super::Store;
use crate::types::now_ms;

impl Store {
    /// Upsert the heartbeat row with the current time.
    pub fn record_heartbeat(&self) -> Result<()> {
        self.lock()
            .execute(
                "INSERT INTO heartbeat (id, beat_at) VALUES (1, ?1) \
                 ON CONFLICT(id) DO UPDATE SET beat_at = excluded.beat_at",
                params![now_ms()],
            )
            .context("record heartbeat")?;
        Ok(())
    }

    /// Last recorded heartbeat, if any.
    pub fn last_heartbeat_ms(&self) -> Result<Option<i64>> {
        self.lock()
            .query_row("SELECT beat_at FROM heartbeat WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .context("read heartbeat")
    }
}
