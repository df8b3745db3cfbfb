//! High-level [`VaultStore`] facade.
//!
//! Composes the repositories over one database and the artifacts directory.
//! Multi-row writes run inside a single transaction via
//! [`VaultStore::in_transaction`] — callers never observe partial state.

use rusqlite::Connection;
use tracing::{info, warn};

use vault_core::{Provider, Result, VaultError, VaultPaths};

use crate::connection::Database;
use crate::migrations::{run_migrations, MigrateOptions};
use crate::repositories::artifact::{ArtifactRepo, NewArtifact};
use crate::repositories::message::MessageRepo;
use crate::repositories::run::RunRepo;
use crate::repositories::search::{SearchHit, SearchRepo};
use crate::repositories::thread::ThreadRepo;
use crate::row_types::{RunRow, RunStatus};

pub use crate::repositories::artifact::StoredArtifact;

/// Row counts across the relational tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultCounts {
    pub runs: i64,
    pub artifacts: i64,
    pub threads: i64,
    pub messages: i64,
}

/// The vault's storage engine: relational rows, artifact files, FTS.
pub struct VaultStore {
    db: Database,
    paths: VaultPaths,
}

impl VaultStore {
    /// Open the store at its on-disk layout, creating directories and
    /// migrating the schema as needed.
    pub fn open(paths: &VaultPaths) -> Result<Self> {
        paths.ensure_dirs().map_err(|source| VaultError::FsWrite {
            path: paths.artifacts().to_path_buf(),
            source,
        })?;
        let db = Database::open(paths.db())?;
        Self::attach(db, paths.clone())
    }

    /// Wrap an already-open database (in-memory in tests). Runs migrations.
    pub fn attach(db: Database, paths: VaultPaths) -> Result<Self> {
        db.with_conn(|conn| run_migrations(conn, &MigrateOptions::default()))?;
        Ok(Self { db, paths })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    // ─────────────────────────────────────────────────────────────────────
    // Runs
    // ─────────────────────────────────────────────────────────────────────

    pub fn create_run(&self, provider: Provider, source_label: Option<&str>) -> Result<RunRow> {
        self.db
            .with_conn(|conn| RunRepo::create(conn, provider, source_label))
    }

    pub fn finalize_run(
        &self,
        run_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        self.db
            .with_conn(|conn| RunRepo::finalize(conn, run_id, status, error_message))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Artifacts
    // ─────────────────────────────────────────────────────────────────────

    /// Store bytes as a content-addressed artifact file plus row.
    pub fn store_raw_artifact(&self, new: &NewArtifact<'_>) -> Result<StoredArtifact> {
        self.db
            .with_conn(|conn| ArtifactRepo::store(conn, self.paths.artifacts(), new))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.db.with_conn(|conn| SearchRepo::search(conn, query))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────

    /// Run `f` inside one transaction. An `Err` rolls everything back.
    ///
    /// This is the atomicity unit around a parser invocation: a parser
    /// failure at any point leaves zero new threads and zero new messages
    /// visible.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Wipe
    // ─────────────────────────────────────────────────────────────────────

    /// Forensic wipe, two-phase.
    ///
    /// Phase one deletes every file under the artifacts directory,
    /// accumulating per-file errors; any error aborts before the database
    /// is touched, so rows are never deleted while their files survive.
    /// Phase two truncates the relational tables in one transaction (the
    /// FTS index follows via trigger).
    pub fn wipe(&self) -> Result<()> {
        let artifacts_dir = self.paths.artifacts();
        let mut failures: Vec<(std::path::PathBuf, std::io::Error)> = Vec::new();
        let mut removed = 0usize;

        if artifacts_dir.exists() {
            let entries = std::fs::read_dir(artifacts_dir).map_err(|source| {
                VaultError::FsWrite {
                    path: artifacts_dir.to_path_buf(),
                    source,
                }
            })?;
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(source) => {
                        failures.push((artifacts_dir.to_path_buf(), source));
                        continue;
                    }
                };
                let path = entry.path();
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(source) => failures.push((path, source)),
                }
            }
        }

        if !failures.is_empty() {
            for (path, source) in &failures {
                warn!(path = %path.display(), error = %source, "artifact deletion failed");
            }
            warn!(
                failed = failures.len(),
                "aborting wipe before any database change"
            );
            let (path, source) = failures.swap_remove(0);
            return Err(VaultError::FsWrite { path, source });
        }

        self.in_transaction(|conn| {
            // Order matters: children before owners.
            conn.execute("DELETE FROM messages", [])?;
            conn.execute("DELETE FROM threads", [])?;
            conn.execute("DELETE FROM raw_artifacts", [])?;
            conn.execute("DELETE FROM ingestion_runs", [])?;
            Ok(())
        })?;

        info!(removed, "vault wiped");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Counts
    // ─────────────────────────────────────────────────────────────────────

    pub fn counts(&self) -> Result<VaultCounts> {
        self.db.with_conn(|conn| {
            Ok(VaultCounts {
                runs: RunRepo::count(conn)?,
                artifacts: ArtifactRepo::count(conn)?,
                threads: ThreadRepo::count(conn)?,
                messages: MessageRepo::count(conn)?,
            })
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
