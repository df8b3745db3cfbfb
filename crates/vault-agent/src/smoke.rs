//! Headless smoke driver.
//!
//! Exercises the whole pipeline against a throwaway vault: import a
//! fixture, search for its sentinel, wipe, search again. The JSON report is
//! the contract with the release tooling; exit code 0 means every leg
//! passed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use vault_core::{Provider, VaultPaths};
use vault_ingest::Importer;
use vault_store::VaultStore;

/// Inputs for one smoke pass.
#[derive(Debug)]
pub struct SmokeArgs {
    pub vault_dir: PathBuf,
    pub import: PathBuf,
    pub sentinel: String,
    pub provider: Provider,
    pub smoke_out: PathBuf,
}

/// The report written to `--smoke-out`.
#[derive(Debug, Serialize)]
pub struct SmokeReport {
    pub app_version: String,
    pub commit_sha: Option<String>,
    pub electron_version: Option<String>,
    pub node_version: Option<String>,
    pub platform: String,
    pub provider: String,
    pub fixture_name: String,
    pub sentinel: String,
    pub pass: bool,
    pub import_ms: u64,
    pub search_hits: usize,
    pub search_ms: u64,
    pub wipe_ok: bool,
    pub post_wipe_hits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SmokeReport {
    fn new(args: &SmokeArgs) -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            commit_sha: host_env("VAULT_HOST_COMMIT_SHA"),
            electron_version: host_env("VAULT_HOST_ELECTRON_VERSION"),
            node_version: host_env("VAULT_HOST_NODE_VERSION"),
            platform: std::env::consts::OS.to_string(),
            provider: args.provider.to_string(),
            fixture_name: args
                .import
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            sentinel: args.sentinel.clone(),
            pass: false,
            import_ms: 0,
            search_hits: 0,
            search_ms: 0,
            wipe_ok: false,
            post_wipe_hits: 0,
            error_code: None,
            error_message: None,
        }
    }

    fn record_failure(&mut self, err: &vault_core::VaultError) {
        self.error_code = Some(err.code().as_str().to_string());
        self.error_message = Some(err.to_string());
    }
}

/// Run the smoke pass and write the report. Returns overall pass/fail.
pub fn run(args: &SmokeArgs) -> anyhow::Result<bool> {
    let paths = VaultPaths::new(&args.vault_dir);
    let report = drive(&paths, args);
    write_report(&args.smoke_out, &report)?;
    info!(pass = report.pass, out = %args.smoke_out.display(), "smoke report written");
    Ok(report.pass)
}

fn drive(paths: &VaultPaths, args: &SmokeArgs) -> SmokeReport {
    let mut report = SmokeReport::new(args);

    let store = match VaultStore::open(paths) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            report.record_failure(&err);
            return report;
        }
    };
    let importer = Importer::new(store.clone());

    let started = Instant::now();
    if let Err(err) = importer.import_headless(args.provider, &args.import) {
        report.import_ms = started.elapsed().as_millis() as u64;
        report.record_failure(&err);
        return report;
    }
    report.import_ms = started.elapsed().as_millis() as u64;

    let started = Instant::now();
    match store.search(&args.sentinel) {
        Ok(hits) => {
            report.search_hits = hits.len();
            report.search_ms = started.elapsed().as_millis() as u64;
        }
        Err(err) => {
            report.record_failure(&err);
            return report;
        }
    }

    match store.wipe() {
        Ok(()) => report.wipe_ok = true,
        Err(err) => {
            report.record_failure(&err);
            return report;
        }
    }

    match store.search(&args.sentinel) {
        Ok(hits) => report.post_wipe_hits = hits.len(),
        Err(err) => {
            report.record_failure(&err);
            return report;
        }
    }

    report.pass = report.search_hits > 0 && report.wipe_ok && report.post_wipe_hits == 0;
    report
}

fn write_report(path: &Path, report: &SmokeReport) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("writing smoke report to {}", path.display()))?;
    Ok(())
}

fn host_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(dir: &Path, sentinel: &str) -> PathBuf {
        let export = format!(
            r#"[{{
                "uuid": "u-1",
                "name": "Smoke fixture",
                "created_at": "2024-01-05T08:00:00Z",
                "chat_messages": [
                    {{"uuid": "m-1", "sender": "human", "text": "{sentinel} present",
                      "created_at": "2024-01-05T08:00:01Z"}}
                ]
            }}]"#
        );
        let path = dir.join("claude-export.json");
        std::fs::write(&path, export).unwrap();
        path
    }

    #[test]
    fn passing_run_reports_all_legs() {
        let dir = tempfile::tempdir().unwrap();
        let args = SmokeArgs {
            vault_dir: dir.path().join("vault-home"),
            import: fixture(dir.path(), "SMOKE_SENTINEL_42"),
            sentinel: "SMOKE_SENTINEL_42".to_string(),
            provider: Provider::Claude,
            smoke_out: dir.path().join("out/report.json"),
        };

        let pass = run(&args).unwrap();
        assert!(pass);

        let raw = std::fs::read_to_string(&args.smoke_out).unwrap();
        let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(report["pass"], true);
        assert_eq!(report["provider"], "claude");
        assert_eq!(report["fixture_name"], "claude-export.json");
        assert_eq!(report["sentinel"], "SMOKE_SENTINEL_42");
        assert_eq!(report["search_hits"], 1);
        assert_eq!(report["wipe_ok"], true);
        assert_eq!(report["post_wipe_hits"], 0);
        assert!(report.get("error_code").is_none());
        assert!(report["app_version"].as_str().unwrap().contains('.'));
    }

    #[test]
    fn failing_import_reports_code_and_exits_false() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ nope").unwrap();

        let args = SmokeArgs {
            vault_dir: dir.path().join("vault-home"),
            import: broken,
            sentinel: "NEVER_FOUND".to_string(),
            provider: Provider::Claude,
            smoke_out: dir.path().join("report.json"),
        };

        let pass = run(&args).unwrap();
        assert!(!pass);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&args.smoke_out).unwrap()).unwrap();
        assert_eq!(report["pass"], false);
        assert_eq!(report["error_code"], "PARSE_JSON_FAILED");
        assert!(report["error_message"]
            .as_str()
            .unwrap()
            .starts_with("PARSE_JSON_FAILED"));
    }

    #[test]
    fn sentinel_miss_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let args = SmokeArgs {
            vault_dir: dir.path().join("vault-home"),
            import: fixture(dir.path(), "ACTUAL_TEXT"),
            sentinel: "DIFFERENT_SENTINEL".to_string(),
            provider: Provider::Claude,
            smoke_out: dir.path().join("report.json"),
        };

        let pass = run(&args).unwrap();
        assert!(!pass);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&args.smoke_out).unwrap()).unwrap();
        assert_eq!(report["search_hits"], 0);
        // The pipeline itself still ran to completion.
        assert_eq!(report["wipe_ok"], true);
    }
}
