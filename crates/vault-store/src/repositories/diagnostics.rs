//! Diagnostics repository — privacy-allowlisted aggregates.
//!
//! Everything here may leave the vault through a diagnostics report, so the
//! queries touch only `schema_meta`, `ingestion_runs`, and `raw_artifacts`
//! (plus SQLite's own pragmas). Never messages, never threads, never titles,
//! never filenames. Run error messages are reduced to their error code and a
//! path-redacted tail before they leave this module.

use rusqlite::{params, Connection};
use serde::Serialize;

use vault_core::{redact_paths, ErrorCode, Result};

use crate::migrations;

/// Run counts by lifecycle status.
#[derive(Debug, Clone, Serialize)]
pub struct RunsSummary {
    pub total: i64,
    pub running: i64,
    pub complete: i64,
    pub failed: i64,
}

/// One recent run, stripped to allowlisted fields.
#[derive(Debug, Clone, Serialize)]
pub struct RecentRun {
    pub id: i64,
    pub provider: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Artifact counts and bytes grouped by provider and type.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactBreakdown {
    pub provider: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub count: i64,
    pub total_bytes: i64,
}

/// Diagnostics repository — stateless, every method takes `&Connection`.
pub struct DiagnosticsRepo;

impl DiagnosticsRepo {
    /// Applied schema version (0 on a virgin database).
    pub fn schema_version(conn: &Connection) -> Result<u32> {
        migrations::current_version(conn)
    }

    /// Whether the FTS table and all three triggers are present.
    pub fn fts_enabled(conn: &Connection) -> Result<bool> {
        let table: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name = 'messages_fts'",
            [],
            |row| row.get(0),
        )?;
        let triggers: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'trigger' AND name IN
                 ('messages_fts_insert', 'messages_fts_delete', 'messages_fts_update')",
            [],
            |row| row.get(0),
        )?;
        Ok(table == 1 && triggers == 3)
    }

    /// Total bytes across all stored artifacts.
    pub fn artifacts_total_bytes(conn: &Connection) -> Result<i64> {
        let total = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM raw_artifacts",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Artifact counts and bytes grouped by (provider, type).
    pub fn artifact_breakdown(conn: &Connection) -> Result<Vec<ArtifactBreakdown>> {
        let mut stmt = conn.prepare(
            "SELECT provider, artifact_type, COUNT(*), COALESCE(SUM(size_bytes), 0)
             FROM raw_artifacts
             GROUP BY provider, artifact_type
             ORDER BY provider, artifact_type",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ArtifactBreakdown {
                    provider: row.get(0)?,
                    artifact_type: row.get(1)?,
                    count: row.get(2)?,
                    total_bytes: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn runs_summary(conn: &Connection) -> Result<RunsSummary> {
        let (total, running, complete, failed) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'running'), 0),
                    COALESCE(SUM(status = 'complete'), 0),
                    COALESCE(SUM(status = 'failed'), 0)
             FROM ingestion_runs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        Ok(RunsSummary {
            total,
            running,
            complete,
            failed,
        })
    }

    /// Most recent runs with error messages reduced to code + redacted tail.
    pub fn recent_runs(conn: &Connection, limit: i64) -> Result<Vec<RecentRun>> {
        let mut stmt = conn.prepare(
            "SELECT id, provider, status, started_at, completed_at, error_message
             FROM ingestion_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                let raw_error: Option<String> = row.get(5)?;
                Ok(RecentRun {
                    id: row.get(0)?,
                    provider: row.get(1)?,
                    status: row.get(2)?,
                    started_at: row.get(3)?,
                    completed_at: row.get(4)?,
                    error_code: raw_error.as_deref().map(ErrorCode::from_message),
                    error_message: raw_error.as_deref().map(redact_paths),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `PRAGMA integrity_check` — "ok" on a healthy database.
    pub fn integrity_check(conn: &Connection) -> Result<String> {
        let verdict = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(verdict)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
