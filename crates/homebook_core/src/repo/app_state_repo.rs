//! Key/value application state stored next to the records.
//!
//! Holds shell-owned flags such as the persisted login session. Values are
//! opaque strings; callers own their meaning.

use super::record_store::RepoResult;
use crate::model::now_epoch_ms;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteAppStateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAppStateRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO app_state (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value, now_epoch_ms()],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM app_state WHERE key = ?1;", [key])?;
        Ok(())
    }
}
