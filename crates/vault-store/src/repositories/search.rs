//! Search repository — FTS5 full-text search over messages.
//!
//! `messages_fts` is an external-content mirror of `messages`, kept in sync
//! by triggers. The query string is handed to FTS5 verbatim: tokens, quoted
//! phrases, and boolean operators are the engine's grammar.

use rusqlite::{params, Connection};
use serde::Serialize;

use vault_core::Result;

/// One search hit, joined with its thread.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub message_id: i64,
    pub thread_id: i64,
    pub content: String,
    pub role: String,
    pub timestamp: Option<i64>,
    pub thread_title: String,
    pub provider: String,
}

/// Search repository — stateless, every method takes `&Connection`.
pub struct SearchRepo;

impl SearchRepo {
    /// Rank-ordered full-text search across all messages.
    pub fn search(conn: &Connection, query: &str) -> Result<Vec<SearchHit>> {
        let mut stmt = conn.prepare(
            "SELECT m.id, m.thread_id, m.content, m.role, m.timestamp,
                    t.title, t.provider
             FROM messages_fts f
             JOIN messages m ON f.rowid = m.id
             JOIN threads  t ON m.thread_id = t.id
             WHERE messages_fts MATCH ?1
             ORDER BY rank",
        )?;
        let hits = stmt
            .query_map(params![query], |row| {
                Ok(SearchHit {
                    message_id: row.get(0)?,
                    thread_id: row.get(1)?,
                    content: row.get(2)?,
                    role: row.get(3)?,
                    timestamp: row.get(4)?,
                    thread_title: row.get(5)?,
                    provider: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
