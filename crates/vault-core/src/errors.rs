//! Error types for the vault.
//!
//! [`VaultError`] is the primary error type across ingestion, storage, and
//! search. Every variant renders with a stable code prefix — the codes are
//! the wire contract with the host shell and must not change. A run's stored
//! `error_message` classifies back to its [`ErrorCode`] by that prefix.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes surfaced to the host shell and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ZipEntryTooLarge,
    ZipTotalTooLarge,
    ZipTooManyEntries,
    ZipCorrupt,
    ZipSlipDetected,
    ParseJsonFailed,
    HtmlNoMessages,
    SchemaMismatch,
    DbWriteFailed,
    FsWriteFailed,
    UnknownError,
}

impl ErrorCode {
    /// All codes, in wire-contract order.
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::ZipEntryTooLarge,
        ErrorCode::ZipTotalTooLarge,
        ErrorCode::ZipTooManyEntries,
        ErrorCode::ZipCorrupt,
        ErrorCode::ZipSlipDetected,
        ErrorCode::ParseJsonFailed,
        ErrorCode::HtmlNoMessages,
        ErrorCode::SchemaMismatch,
        ErrorCode::DbWriteFailed,
        ErrorCode::FsWriteFailed,
        ErrorCode::UnknownError,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ZipEntryTooLarge => "ZIP_ENTRY_TOO_LARGE",
            ErrorCode::ZipTotalTooLarge => "ZIP_TOTAL_TOO_LARGE",
            ErrorCode::ZipTooManyEntries => "ZIP_TOO_MANY_ENTRIES",
            ErrorCode::ZipCorrupt => "ZIP_CORRUPT",
            ErrorCode::ZipSlipDetected => "ZIP_SLIP_DETECTED",
            ErrorCode::ParseJsonFailed => "PARSE_JSON_FAILED",
            ErrorCode::HtmlNoMessages => "HTML_NO_MESSAGES",
            ErrorCode::SchemaMismatch => "SCHEMA_MISMATCH",
            ErrorCode::DbWriteFailed => "DB_WRITE_FAILED",
            ErrorCode::FsWriteFailed => "FS_WRITE_FAILED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Classify a stored error message back to its code by prefix.
    ///
    /// Every [`VaultError`] display starts with its code, so messages copied
    /// into `ingestion_runs.error_message` round-trip. Anything else maps to
    /// [`ErrorCode::UnknownError`].
    #[must_use]
    pub fn from_message(message: &str) -> ErrorCode {
        Self::ALL
            .into_iter()
            .find(|code| message.starts_with(code.as_str()))
            .unwrap_or(ErrorCode::UnknownError)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by ingestion, storage, and search.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A single archive entry declares an uncompressed size over the limit.
    #[error("ZIP_ENTRY_TOO_LARGE: entry '{name}' declares {declared} bytes (limit {limit})")]
    ZipEntryTooLarge {
        name: String,
        declared: u64,
        limit: u64,
    },

    /// Declared uncompressed sizes sum past the archive-wide limit.
    #[error("ZIP_TOTAL_TOO_LARGE: archive declares over {limit} total uncompressed bytes")]
    ZipTotalTooLarge { limit: u64 },

    /// More entries than the archive-wide limit.
    #[error("ZIP_TOO_MANY_ENTRIES: {count} entries (limit {limit})")]
    ZipTooManyEntries { count: usize, limit: usize },

    /// Unparseable archive, or an entry with a bomb-class compression ratio.
    #[error("ZIP_CORRUPT: {message}")]
    ZipCorrupt { message: String },

    /// Entry name contains a `..` component or is absolute.
    #[error("ZIP_SLIP_DETECTED: entry name '{name}' escapes the extraction root")]
    ZipSlipDetected { name: String },

    /// Input is not valid JSON.
    #[error("PARSE_JSON_FAILED: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// The HTML fallback found no message blocks.
    #[error("HTML_NO_MESSAGES: no message blocks found in chat.html")]
    HtmlNoMessages,

    /// Valid JSON with none of the provider's recognized fields.
    #[error("SCHEMA_MISMATCH: {message}")]
    SchemaMismatch { message: String },

    /// Database write or transaction failure.
    #[error("DB_WRITE_FAILED: {0}")]
    Db(#[from] rusqlite::Error),

    /// Artifact file write failure.
    #[error("FS_WRITE_FAILED: {}: {source}", .path.display())]
    FsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catch-all for failures outside the enumerated classes.
    #[error("UNKNOWN_ERROR: {0}")]
    Other(String),
}

impl VaultError {
    /// The wire-contract code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            VaultError::ZipEntryTooLarge { .. } => ErrorCode::ZipEntryTooLarge,
            VaultError::ZipTotalTooLarge { .. } => ErrorCode::ZipTotalTooLarge,
            VaultError::ZipTooManyEntries { .. } => ErrorCode::ZipTooManyEntries,
            VaultError::ZipCorrupt { .. } => ErrorCode::ZipCorrupt,
            VaultError::ZipSlipDetected { .. } => ErrorCode::ZipSlipDetected,
            VaultError::ParseJson(_) => ErrorCode::ParseJsonFailed,
            VaultError::HtmlNoMessages => ErrorCode::HtmlNoMessages,
            VaultError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            VaultError::Db(_) => ErrorCode::DbWriteFailed,
            VaultError::FsWrite { .. } => ErrorCode::FsWriteFailed,
            VaultError::Other(_) => ErrorCode::UnknownError,
        }
    }
}

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Replace absolute filesystem paths in a message with `[PATH_REDACTED]`.
///
/// Applied before an error message leaves the vault through diagnostics.
#[must_use]
pub fn redact_paths(message: &str) -> String {
    static PATHS: OnceLock<Regex> = OnceLock::new();
    let re = PATHS.get_or_init(|| {
        // Absolute only: a leading `/` or a Windows drive prefix. Relative
        // names like `data/conversations.json` are left intact — the guard
        // group keeps a mid-word slash from matching.
        Regex::new(r#"(?P<pre>^|[\s'"(=:])(?:[A-Za-z]:[/\\]|/)[\w.~-]+(?:[/\\][\w.~-]+)*"#)
            .expect("static pattern")
    });
    re.replace_all(message, "${pre}[PATH_REDACTED]").into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
