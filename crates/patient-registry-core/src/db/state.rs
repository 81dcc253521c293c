//! Key/value state and the persisted fallback counter.

use rusqlite::{params, OptionalExtension};
use tracing::warn;

use super::{Database, DbResult, SERIAL_COUNT_DATE_KEY, SERIAL_COUNT_KEY};
use crate::allocator::{CounterStore, FallbackCounter};
use crate::models::DateKey;

impl Database {
    /// Get a state value.
    pub fn get_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set a state value.
    pub fn set_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO local_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a state value.
    pub fn delete_state(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM local_state WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }
}

impl CounterStore for Database {
    fn read(&self) -> DbResult<Option<FallbackCounter>> {
        let date = self.get_state(SERIAL_COUNT_DATE_KEY)?;
        let count = self.get_state(SERIAL_COUNT_KEY)?;

        let (Some(date), Some(count)) = (date, count) else {
            return Ok(None);
        };

        match (date.parse::<DateKey>(), count.trim().parse::<u32>()) {
            (Ok(date), Ok(count)) => Ok(Some(FallbackCounter::new(date, count))),
            _ => {
                warn!(date = %date, count = %count, "Ignoring unreadable fallback counter");
                Ok(None)
            }
        }
    }

    fn write(&self, counter: &FallbackCounter) -> DbResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in [
            (SERIAL_COUNT_DATE_KEY, counter.date.to_string()),
            (SERIAL_COUNT_KEY, counter.count.to_string()),
        ] {
            tx.execute(
                "INSERT OR REPLACE INTO local_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
