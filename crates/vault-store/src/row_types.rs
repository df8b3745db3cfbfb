//! Raw database row structs for `rusqlite` row mapping.

use serde::Serialize;

/// Lifecycle status of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One import attempt — the audit unit.
#[derive(Debug, Clone, Serialize)]
pub struct RunRow {
    pub id: i64,
    pub provider: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub source_label: Option<String>,
    pub error_message: Option<String>,
}

/// One byte-identical ingested file, keyed by its SHA-256.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRow {
    pub id: i64,
    pub ingestion_run_id: i64,
    pub parent_artifact_id: Option<i64>,
    pub provider: String,
    pub artifact_type: String,
    pub filename: String,
    pub path_in_container: Option<String>,
    pub size_bytes: i64,
    pub sha256: String,
    pub stored_path: String,
    pub imported_at: String,
}

/// A normalized conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadRow {
    pub id: i64,
    pub provider: String,
    pub provider_thread_id: Option<String>,
    pub title: String,
    pub created_at: Option<i64>,
    pub artifact_id: i64,
    pub ingestion_run_id: i64,
}

/// A normalized utterance.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub thread_id: i64,
    pub provider: String,
    pub provider_message_id: Option<String>,
    pub role: String,
    pub content: String,
    pub content_plain: String,
    pub timestamp: Option<i64>,
    pub position: i64,
    pub parent_provider_message_id: Option<String>,
    pub content_sha256: String,
    pub artifact_id: i64,
    pub ingestion_run_id: i64,
}
