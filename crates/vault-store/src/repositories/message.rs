//! Message repository.
//!
//! The content hash is computed here so every caller gets the same
//! SHA-256-of-raw-content behavior; `position` is caller-assigned and dense
//! within a thread in parser-emission order.

use rusqlite::{params, Connection, OptionalExtension};

use vault_core::{Provider, Result};

use crate::repositories::artifact::hex_sha256;
use crate::row_types::MessageRow;

/// Input for [`MessageRepo::insert`].
#[derive(Debug)]
pub struct NewMessage<'a> {
    pub thread_id: i64,
    pub provider: Provider,
    pub provider_message_id: Option<&'a str>,
    pub role: &'a str,
    pub content: &'a str,
    pub content_plain: &'a str,
    pub timestamp: Option<i64>,
    pub position: i64,
    pub parent_provider_message_id: Option<&'a str>,
    pub artifact_id: i64,
    pub run_id: i64,
}

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message, returning its id. The FTS index follows by trigger.
    pub fn insert(conn: &Connection, new: &NewMessage<'_>) -> Result<i64> {
        let content_sha256 = hex_sha256(new.content.as_bytes());
        conn.execute(
            "INSERT INTO messages
                 (thread_id, provider, provider_message_id, role, content, content_plain,
                  timestamp, position, parent_provider_message_id, content_sha256,
                  artifact_id, ingestion_run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.thread_id,
                new.provider.as_str(),
                new.provider_message_id,
                new.role,
                new.content,
                new.content_plain,
                new.timestamp,
                new.position,
                new.parent_provider_message_id,
                content_sha256,
                new.artifact_id,
                new.run_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                "SELECT id, thread_id, provider, provider_message_id, role, content,
                        content_plain, timestamp, position, parent_provider_message_id,
                        content_sha256, artifact_id, ingestion_run_id
                 FROM messages WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Messages of one thread in position order.
    pub fn list_by_thread(conn: &Connection, thread_id: i64) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, provider, provider_message_id, role, content,
                    content_plain, timestamp, position, parent_provider_message_id,
                    content_sha256, artifact_id, ingestion_run_id
             FROM messages WHERE thread_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt
            .query_map(params![thread_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Messages inserted by a specific run (failed-run atomicity checks).
    pub fn count_by_run(conn: &Connection, run_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE ingestion_run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            provider: row.get(2)?,
            provider_message_id: row.get(3)?,
            role: row.get(4)?,
            content: row.get(5)?,
            content_plain: row.get(6)?,
            timestamp: row.get(7)?,
            position: row.get(8)?,
            parent_provider_message_id: row.get(9)?,
            content_sha256: row.get(10)?,
            artifact_id: row.get(11)?,
            ingestion_run_id: row.get(12)?,
        })
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::{run_migrations, MigrateOptions};
    use crate::repositories::artifact::{ArtifactRepo, NewArtifact};
    use crate::repositories::run::RunRepo;
    use crate::repositories::thread::{NewThread, ThreadRepo};

    fn setup() -> (Connection, tempfile::TempDir, i64, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn, &MigrateOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let run = RunRepo::create(&conn, Provider::Gemini, None).unwrap();
        let artifact = ArtifactRepo::store(
            &conn,
            dir.path(),
            &NewArtifact {
                run_id: run.id,
                parent_artifact_id: None,
                provider: Provider::Gemini,
                artifact_type: "json",
                filename: "takeout.json",
                path_in_container: None,
                bytes: b"[]",
            },
        )
        .unwrap();
        let thread_id = ThreadRepo::insert(
            &conn,
            &NewThread {
                provider: Provider::Gemini,
                provider_thread_id: None,
                title: "Untitled",
                created_at: None,
                artifact_id: artifact.id,
                run_id: run.id,
            },
        )
        .unwrap();
        (conn, dir, run.id, artifact.id, thread_id)
    }

    fn message<'a>(
        thread_id: i64,
        artifact_id: i64,
        run_id: i64,
        content: &'a str,
        position: i64,
    ) -> NewMessage<'a> {
        NewMessage {
            thread_id,
            provider: Provider::Gemini,
            provider_message_id: None,
            role: "user",
            content,
            content_plain: content,
            timestamp: Some(1_700_000_000_000),
            position,
            parent_provider_message_id: None,
            artifact_id,
            run_id,
        }
    }

    #[test]
    fn insert_hashes_raw_content() {
        let (conn, _dir, run_id, artifact_id, thread_id) = setup();
        let id = MessageRepo::insert(
            &conn,
            &message(thread_id, artifact_id, run_id, "hello world", 0),
        )
        .unwrap();

        let row = MessageRepo::get(&conn, id).unwrap().unwrap();
        assert_eq!(row.content_sha256, hex_sha256(b"hello world"));
        assert_eq!(row.position, 0);
    }

    #[test]
    fn list_by_thread_orders_by_position() {
        let (conn, _dir, run_id, artifact_id, thread_id) = setup();
        for (i, text) in ["first", "second", "third"].iter().enumerate() {
            MessageRepo::insert(
                &conn,
                &message(thread_id, artifact_id, run_id, text, i as i64),
            )
            .unwrap();
        }

        let rows = MessageRepo::list_by_thread(&conn, thread_id).unwrap();
        let contents: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        let positions: Vec<i64> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, [0, 1, 2]);
    }

    #[test]
    fn fts_round_trip_per_message() {
        let (conn, _dir, run_id, artifact_id, thread_id) = setup();
        let id = MessageRepo::insert(
            &conn,
            &message(thread_id, artifact_id, run_id, "unmistakable sentinel phrase", 0),
        )
        .unwrap();

        let rowid: i64 = conn
            .query_row(
                "SELECT rowid FROM messages_fts WHERE messages_fts MATCH 'unmistakable'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rowid, id);
    }
}
