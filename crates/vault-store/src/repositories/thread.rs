//! Thread repository.

use rusqlite::{params, Connection, OptionalExtension};

use vault_core::{Provider, Result};

use crate::row_types::ThreadRow;

/// Input for [`ThreadRepo::insert`].
#[derive(Debug)]
pub struct NewThread<'a> {
    pub provider: Provider,
    pub provider_thread_id: Option<&'a str>,
    pub title: &'a str,
    pub created_at: Option<i64>,
    pub artifact_id: i64,
    pub run_id: i64,
}

/// Thread repository — stateless, every method takes `&Connection`.
pub struct ThreadRepo;

impl ThreadRepo {
    /// Insert a thread, returning its id.
    pub fn insert(conn: &Connection, new: &NewThread<'_>) -> Result<i64> {
        conn.execute(
            "INSERT INTO threads
                 (provider, provider_thread_id, title, created_at, artifact_id, ingestion_run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.provider.as_str(),
                new.provider_thread_id,
                new.title,
                new.created_at,
                new.artifact_id,
                new.run_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<ThreadRow>> {
        let row = conn
            .query_row(
                "SELECT id, provider, provider_thread_id, title, created_at, artifact_id,
                        ingestion_run_id
                 FROM threads WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ThreadRow {
                        id: row.get(0)?,
                        provider: row.get(1)?,
                        provider_thread_id: row.get(2)?,
                        title: row.get(3)?,
                        created_at: row.get(4)?,
                        artifact_id: row.get(5)?,
                        ingestion_run_id: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM threads", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Threads inserted by a specific run (failed-run atomicity checks).
    pub fn count_by_run(conn: &Connection, run_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM threads WHERE ingestion_run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a thread; messages cascade.
    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM threads WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
