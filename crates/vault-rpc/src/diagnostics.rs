//! Diagnostics report assembly.
//!
//! Everything in the report comes from the allowlisted aggregate queries in
//! the store plus process-level facts. Host-shell fields (app packaging,
//! shell runtime versions) are injected through `VAULT_HOST_*` environment
//! variables and stay null when the shell didn't provide them — the vault
//! never guesses another process's versions.

use serde::Serialize;

use vault_core::Result;
use vault_store::repositories::diagnostics::{ArtifactBreakdown, DiagnosticsRepo, RecentRun, RunsSummary};
use vault_store::VaultStore;

const RECENT_RUN_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    pub generated_at: String,
    pub app: AppInfo,
    pub runtime: RuntimeInfo,
    pub vault: VaultInfo,
    pub ingestion: IngestionInfo,
    pub artifacts: Vec<ArtifactBreakdown>,
    pub health: HealthInfo,
}

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub is_packaged: bool,
}

#[derive(Debug, Serialize)]
pub struct RuntimeInfo {
    pub platform: String,
    pub arch: String,
    pub electron: Option<String>,
    pub node: Option<String>,
    pub os_release: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VaultInfo {
    pub schema_version: u32,
    pub db_size_bytes: u64,
    pub artifacts_total_bytes: i64,
    pub fts_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct IngestionInfo {
    pub runs_summary: RunsSummary,
    pub recent_runs: Vec<RecentRun>,
}

#[derive(Debug, Serialize)]
pub struct HealthInfo {
    pub sqlite_integrity_check: String,
}

/// Build the full report from allowlisted queries.
pub fn generate(store: &VaultStore) -> Result<DiagnosticsReport> {
    let (schema_version, artifacts_total_bytes, fts_enabled, runs_summary, recent_runs, breakdown, integrity) =
        store.db().with_conn(|conn| {
            Ok((
                DiagnosticsRepo::schema_version(conn)?,
                DiagnosticsRepo::artifacts_total_bytes(conn)?,
                DiagnosticsRepo::fts_enabled(conn)?,
                DiagnosticsRepo::runs_summary(conn)?,
                DiagnosticsRepo::recent_runs(conn, RECENT_RUN_LIMIT)?,
                DiagnosticsRepo::artifact_breakdown(conn)?,
                DiagnosticsRepo::integrity_check(conn)?,
            ))
        })?;

    Ok(DiagnosticsReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        app: AppInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            is_packaged: host_env_flag("VAULT_HOST_IS_PACKAGED"),
        },
        runtime: RuntimeInfo {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            electron: host_env("VAULT_HOST_ELECTRON_VERSION"),
            node: host_env("VAULT_HOST_NODE_VERSION"),
            os_release: os_release(),
        },
        vault: VaultInfo {
            schema_version,
            db_size_bytes: store.db().file_size_bytes(),
            artifacts_total_bytes,
            fts_enabled,
        },
        ingestion: IngestionInfo {
            runs_summary,
            recent_runs,
        },
        artifacts: breakdown,
        health: HealthInfo {
            sqlite_integrity_check: integrity,
        },
    })
}

fn host_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn host_env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

#[cfg(target_os = "linux")]
fn os_release() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
}

#[cfg(not(target_os = "linux"))]
fn os_release() -> Option<String> {
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use vault_core::{Provider, VaultPaths};
    use vault_store::repositories::artifact::NewArtifact;
    use vault_store::row_types::RunStatus;

    fn store() -> (VaultStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = VaultPaths::new(dir.path());
        (VaultStore::open(&paths).unwrap(), dir)
    }

    #[test]
    fn report_shape_on_fresh_vault() {
        let (store, _dir) = store();
        let report = generate(&store).unwrap();

        assert!(report.vault.fts_enabled);
        assert!(report.vault.schema_version >= 1);
        assert_eq!(report.vault.artifacts_total_bytes, 0);
        assert_eq!(report.ingestion.runs_summary.total, 0);
        assert!(report.ingestion.recent_runs.is_empty());
        assert!(report.artifacts.is_empty());
        assert_eq!(report.health.sqlite_integrity_check, "ok");
        assert_eq!(report.runtime.platform, std::env::consts::OS);
    }

    #[test]
    fn report_never_serializes_content_fields() {
        let (store, _dir) = store();
        let run = store.create_run(Provider::Chatgpt, None).unwrap();
        store
            .store_raw_artifact(&NewArtifact {
                run_id: run.id,
                parent_artifact_id: None,
                provider: Provider::Chatgpt,
                artifact_type: "json",
                filename: "secret-filename.json",
                path_in_container: None,
                bytes: b"[]",
            })
            .unwrap();
        store
            .finalize_run(
                run.id,
                RunStatus::Failed,
                Some("FS_WRITE_FAILED: /home/someone/private/export.zip: denied"),
            )
            .unwrap();

        let report = generate(&store).unwrap();
        let wire = serde_json::to_string(&report).unwrap();

        // The allowlist: no filenames, no titles, no message content, no
        // raw absolute paths.
        assert!(!wire.contains("secret-filename"));
        assert!(!wire.contains("/home/someone"));
        assert!(wire.contains("[PATH_REDACTED]"));
        assert!(wire.contains("FS_WRITE_FAILED"));

        let failed_run = &report.ingestion.recent_runs[0];
        assert_eq!(
            failed_run.error_code,
            Some(vault_core::ErrorCode::FsWriteFailed)
        );
    }

    #[test]
    fn artifact_breakdown_counts_bytes() {
        let (store, _dir) = store();
        let run = store.create_run(Provider::Gemini, None).unwrap();
        store
            .store_raw_artifact(&NewArtifact {
                run_id: run.id,
                parent_artifact_id: None,
                provider: Provider::Gemini,
                artifact_type: "zip",
                filename: "takeout.zip",
                path_in_container: None,
                bytes: b"PK-12345",
            })
            .unwrap();

        let report = generate(&store).unwrap();
        assert_eq!(report.vault.artifacts_total_bytes, 8);
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].provider, "gemini");
        assert_eq!(report.artifacts[0].count, 1);

        // Sanity: the stored path exists and is under the artifacts dir.
        store
            .db()
            .with_conn(|conn| {
                let path: String = conn
                    .query_row("SELECT stored_path FROM raw_artifacts", [], |row| {
                        row.get(0)
                    })
                    .map_err(vault_core::VaultError::from)?;
                assert!(Path::new(&path).exists());
                Ok(())
            })
            .unwrap();
    }
}
