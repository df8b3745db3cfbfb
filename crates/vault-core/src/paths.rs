//! Vault path resolution.
//!
//! Every path the vault touches derives from a single user-data directory,
//! resolved once at startup and frozen. The freeze exists to kill the class
//! of bug where a component captures a path before the caller (a smoke run
//! injecting a temp directory, for instance) has overridden the user-data
//! root.
//!
//! [`VaultPaths`] is a plain value so tests and the smoke driver construct
//! it directly; [`PathRoot`] is the process-wide one-shot cell the server
//! uses.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

/// Derived vault locations for one user-data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    user_data: PathBuf,
    vault: PathBuf,
    db: PathBuf,
    artifacts: PathBuf,
}

impl VaultPaths {
    /// Derive all vault paths from a user-data directory.
    #[must_use]
    pub fn new(user_data: impl Into<PathBuf>) -> Self {
        let user_data = user_data.into();
        let vault = user_data.join("vault");
        let db = vault.join("vault.db");
        let artifacts = vault.join("artifacts");
        Self {
            user_data,
            vault,
            db,
            artifacts,
        }
    }

    #[must_use]
    pub fn user_data(&self) -> &Path {
        &self.user_data
    }

    #[must_use]
    pub fn vault(&self) -> &Path {
        &self.vault
    }

    #[must_use]
    pub fn db(&self) -> &Path {
        &self.db
    }

    #[must_use]
    pub fn artifacts(&self) -> &Path {
        &self.artifacts
    }

    /// Create the vault and artifacts directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.artifacts)
    }

    /// Whether `candidate` lies under the artifacts directory.
    #[must_use]
    pub fn contains_artifact(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.artifacts)
    }
}

/// Errors from the process-wide path root.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathRootError {
    /// `init` was called twice — a programming error.
    #[error("path root already initialized (user data: {existing})")]
    AlreadyInitialized { existing: String },

    /// A reader asked for paths before `init` ran.
    #[error("path root read before initialization")]
    NotInitialized,
}

static ROOT: OnceLock<VaultPaths> = OnceLock::new();

/// Process-wide frozen [`VaultPaths`].
pub struct PathRoot;

impl PathRoot {
    /// Initialize the root exactly once. A second call fails fast.
    pub fn init(user_data: impl Into<PathBuf>) -> Result<&'static VaultPaths, PathRootError> {
        let paths = VaultPaths::new(user_data);
        if ROOT.set(paths).is_err() {
            let existing = ROOT
                .get()
                .map(|p| p.user_data().display().to_string())
                .unwrap_or_default();
            return Err(PathRootError::AlreadyInitialized { existing });
        }
        Ok(ROOT.get().expect("set above"))
    }

    /// The frozen paths. Fails fast before [`PathRoot::init`].
    pub fn get() -> Result<&'static VaultPaths, PathRootError> {
        ROOT.get().ok_or(PathRootError::NotInitialized)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
