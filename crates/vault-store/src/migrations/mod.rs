//! Schema migration runner.
//!
//! Migrations are embedded at compile time via [`include_str!`] and executed
//! in version order. Each migration runs inside its own transaction and
//! records its version in `schema_meta` before committing — a failure rolls
//! back cleanly, leaving the database at the highest successfully applied
//! version.
//!
//! After the migration loop the FTS virtual table and its three triggers
//! are re-asserted unconditionally (`CREATE … IF NOT EXISTS`). That repair
//! pass makes the index resilient to dropped triggers and to databases
//! produced before the triggers existed. Finally `PRAGMA user_version` is
//! set to mirror the `schema_meta` value.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use vault_core::{Result, VaultError};

/// A single migration with a version number and SQL to execute.
#[derive(Debug)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All shipped migrations, in version order. Append-only once released.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Complete schema — runs, artifacts, threads, messages, indexes",
    sql: include_str!("v001_schema.sql"),
}];

/// FTS virtual table + trigger DDL, re-asserted on every migrate call.
const FTS_DDL: &str = include_str!("fts.sql");

/// Overrides for [`run_migrations`], used by tests to inject a migration
/// list or stop at an intermediate version.
#[derive(Debug, Default)]
pub struct MigrateOptions<'a> {
    /// Replacement migration list. `None` uses the shipped list.
    pub migrations: Option<&'a [Migration]>,
    /// Highest version to apply. `None` applies everything.
    pub target: Option<u32>,
}

/// Bring the database to the target schema version and repair FTS objects.
///
/// Idempotent: already-applied versions are skipped, and the FTS DDL is
/// create-if-not-exists. Returns the final schema version.
pub fn run_migrations(conn: &Connection, opts: &MigrateOptions<'_>) -> Result<u32> {
    let migrations = opts.migrations.unwrap_or(MIGRATIONS);
    let target = opts
        .target
        .unwrap_or_else(|| migrations.last().map_or(0, |m| m.version));

    let current = current_version(conn)?;
    let mut applied = 0u32;

    let mut pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.version > current && m.version <= target)
        .collect();
    pending.sort_by_key(|m| m.version);

    for migration in pending {
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply_migration(conn, migration)?;
        applied += 1;
    }

    // Deterministic FTS repair, regardless of migration history.
    conn.execute_batch(FTS_DDL)?;

    let final_version = current_version(conn)?;
    conn.pragma_update(None, "user_version", final_version)?;

    if applied > 0 {
        info!(applied, final_version, "migrations complete");
    }

    Ok(final_version)
}

/// Current schema version: 0 when `schema_meta` is absent or has no
/// `schema_version` key.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let has_meta: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta'",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(0);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(raw) => raw.parse().map_err(|_| {
            VaultError::Other(format!("schema_meta holds non-integer schema_version: {raw}"))
        }),
    }
}

/// The latest migration version shipped in this build.
#[must_use]
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [migration.version.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
