//! `SQLite` storage for the vault.
//!
//! - [`connection`]: single-connection `Database` wrapper with WAL mode,
//!   foreign keys, and a busy timeout applied at open.
//! - [`migrations`]: version-tracked schema evolution. Each migration runs
//!   in its own transaction; the FTS objects are re-asserted on every run.
//! - [`repositories`]: stateless repository structs — each method takes
//!   `&Connection` and executes SQL. No shared mutable state.
//! - [`store`]: the high-level [`VaultStore`] facade composing repositories
//!   into transactional operations, plus the two-phase wipe.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::Database;
pub use migrations::{current_version, latest_version, run_migrations, MigrateOptions, Migration};
pub use store::{StoredArtifact, VaultStore};
