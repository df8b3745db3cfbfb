//! Artifact repository — content-addressed file storage with SHA-256 dedup.
//!
//! Every byte-identical file the vault has ever ingested gets exactly one
//! row and one file at `artifacts/<sha256>-<basename>`. Storing the same
//! bytes again returns the existing row without touching disk.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::debug;

use vault_core::{Provider, Result, VaultError};

use crate::row_types::ArtifactRow;

/// Input for [`ArtifactRepo::store`].
#[derive(Debug)]
pub struct NewArtifact<'a> {
    pub run_id: i64,
    pub parent_artifact_id: Option<i64>,
    pub provider: Provider,
    pub artifact_type: &'a str,
    pub filename: &'a str,
    pub path_in_container: Option<&'a str>,
    pub bytes: &'a [u8],
}

/// Outcome of an artifact store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredArtifact {
    pub id: i64,
    /// `true` when the bytes were already present and nothing was written.
    pub skipped: bool,
}

/// Artifact repository — stateless, every method takes `&Connection`.
pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Persist bytes under the artifacts directory, deduplicating by SHA-256.
    ///
    /// The row is inserted only after the file write succeeds, so a
    /// filesystem failure leaves no row behind.
    pub fn store(
        conn: &Connection,
        artifacts_dir: &Path,
        new: &NewArtifact<'_>,
    ) -> Result<StoredArtifact> {
        let sha = hex_sha256(new.bytes);

        if let Some(existing) = Self::id_by_sha(conn, &sha)? {
            debug!(artifact_id = existing, sha = %sha, "artifact bytes already stored");
            return Ok(StoredArtifact {
                id: existing,
                skipped: true,
            });
        }

        // Never trust the supplied name as a path.
        let safe_name = sanitize_basename(new.filename);
        let stored_path = artifacts_dir.join(format!("{sha}-{safe_name}"));

        std::fs::write(&stored_path, new.bytes).map_err(|source| VaultError::FsWrite {
            path: stored_path.clone(),
            source,
        })?;

        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO raw_artifacts
                 (ingestion_run_id, parent_artifact_id, provider, artifact_type, filename,
                  path_in_container, size_bytes, sha256, stored_path, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.run_id,
                new.parent_artifact_id,
                new.provider.as_str(),
                new.artifact_type,
                safe_name,
                new.path_in_container,
                new.bytes.len() as i64,
                sha,
                stored_path.to_string_lossy().into_owned(),
                now,
            ],
        )?;

        Ok(StoredArtifact {
            id: conn.last_insert_rowid(),
            skipped: false,
        })
    }

    /// Artifact id for a SHA-256, if those bytes were ever stored.
    pub fn id_by_sha(conn: &Connection, sha256: &str) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM raw_artifacts WHERE sha256 = ?1",
                params![sha256],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Full artifact record by id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<ArtifactRow>> {
        let row = conn
            .query_row(
                "SELECT id, ingestion_run_id, parent_artifact_id, provider, artifact_type,
                        filename, path_in_container, size_bytes, sha256, stored_path, imported_at
                 FROM raw_artifacts WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Every stored path, for integrity checks and the wipe sweep.
    pub fn stored_paths(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT stored_path FROM raw_artifacts")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM raw_artifacts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtifactRow> {
        Ok(ArtifactRow {
            id: row.get(0)?,
            ingestion_run_id: row.get(1)?,
            parent_artifact_id: row.get(2)?,
            provider: row.get(3)?,
            artifact_type: row.get(4)?,
            filename: row.get(5)?,
            path_in_container: row.get(6)?,
            size_bytes: row.get(7)?,
            sha256: row.get(8)?,
            stored_path: row.get(9)?,
            imported_at: row.get(10)?,
        })
    }
}

/// Lowercase hex SHA-256 of a byte slice.
#[must_use]
pub fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Strip any directory component from a vendor-supplied filename.
///
/// Splits on both separators because archive entry names may carry either.
/// An empty result falls back to a fixed name — the SHA prefix keeps the
/// final filename unique regardless.
#[must_use]
pub fn sanitize_basename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        "artifact.bin".to_string()
    } else {
        base.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
