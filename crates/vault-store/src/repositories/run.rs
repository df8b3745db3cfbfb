//! Ingestion run repository — the audit trail of import attempts.

use rusqlite::{params, Connection, OptionalExtension};

use vault_core::{Provider, Result};

use crate::row_types::{RunRow, RunStatus};

/// Run repository — stateless, every method takes `&Connection`.
pub struct RunRepo;

impl RunRepo {
    /// Open a new run in `running` status.
    pub fn create(
        conn: &Connection,
        provider: Provider,
        source_label: Option<&str>,
    ) -> Result<RunRow> {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ingestion_runs (provider, status, started_at, source_label)
             VALUES (?1, 'running', ?2, ?3)",
            params![provider.as_str(), now, source_label],
        )?;
        let id = conn.last_insert_rowid();
        Ok(RunRow {
            id,
            provider: provider.as_str().to_string(),
            status: RunStatus::Running.as_str().to_string(),
            started_at: now,
            completed_at: None,
            source_label: source_label.map(str::to_string),
            error_message: None,
        })
    }

    /// Finalize a run exactly once.
    ///
    /// The `WHERE status = 'running'` guard makes a second finalize a no-op
    /// returning `false` — a finalized run is never mutated again.
    pub fn finalize(
        conn: &Connection,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE ingestion_runs
             SET status = ?1, completed_at = ?2, error_message = ?3
             WHERE id = ?4 AND status = 'running'",
            params![status.as_str(), now, error_message, run_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get(conn: &Connection, run_id: i64) -> Result<Option<RunRow>> {
        let row = conn
            .query_row(
                "SELECT id, provider, status, started_at, completed_at, source_label, error_message
                 FROM ingestion_runs WHERE id = ?1",
                params![run_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Most recent runs first.
    pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<RunRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, provider, status, started_at, completed_at, source_label, error_message
             FROM ingestion_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Run counts grouped by status.
    pub fn status_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM ingestion_runs GROUP BY status ORDER BY status",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM ingestion_runs", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
        Ok(RunRow {
            id: row.get(0)?,
            provider: row.get(1)?,
            status: row.get(2)?,
            started_at: row.get(3)?,
            completed_at: row.get(4)?,
            source_label: row.get(5)?,
            error_message: row.get(6)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
