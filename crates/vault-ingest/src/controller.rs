//! The ingest controller: one import, end to end.
//!
//! Owns the run lifecycle around everything else: whole-file read, parent
//! artifact, archive pre-scan, extraction loop with per-entry transactions,
//! and finalization to exactly one of `complete`/`failed`.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use vault_core::{Provider, Result, VaultError};
use vault_store::repositories::artifact::{sanitize_basename, NewArtifact};
use vault_store::row_types::RunStatus;
use vault_store::VaultStore;

use crate::archive;
use crate::limits::ZipLimits;
use crate::parsers::{self, ParseScope, ParserKind};

/// Result of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    pub run_id: i64,
    /// The parent artifact holding the raw bundle bytes.
    pub artifact_id: i64,
}

/// Orchestrates imports against one [`VaultStore`].
pub struct Importer {
    store: Arc<VaultStore>,
    limits: ZipLimits,
}

impl Importer {
    /// Importer with limits from the environment (falling back to defaults).
    #[must_use]
    pub fn new(store: Arc<VaultStore>) -> Self {
        Self::with_limits(store, ZipLimits::from_env())
    }

    #[must_use]
    pub fn with_limits(store: Arc<VaultStore>, limits: ZipLimits) -> Self {
        Self { store, limits }
    }

    /// Import a file from disk without any picker involvement.
    ///
    /// On failure the run is finalized `failed` with the error's message
    /// (whose prefix is the wire-contract code) and the error re-raised.
    /// Artifacts persisted before the failure point stay on disk — their
    /// rows carry the failed run id, which is the forensic record.
    pub fn import_headless(&self, provider: Provider, path: &Path) -> Result<ImportOutcome> {
        let bytes = std::fs::read(path)
            .map_err(|e| VaultError::Other(format!("failed to read import file: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.bin".to_string());

        let run = self.store.create_run(provider, Some(&filename))?;
        info!(
            run_id = run.id,
            provider = %provider,
            size = bytes.len(),
            "import started"
        );

        match self.run_import(run.id, provider, &filename, &bytes) {
            Ok(artifact_id) => {
                self.store
                    .finalize_run(run.id, RunStatus::Complete, None)?;
                info!(run_id = run.id, artifact_id, "import complete");
                Ok(ImportOutcome {
                    run_id: run.id,
                    artifact_id,
                })
            }
            Err(err) => {
                let message = err.to_string();
                warn!(run_id = run.id, error = %message, "import failed");
                if let Err(finalize_err) =
                    self.store
                        .finalize_run(run.id, RunStatus::Failed, Some(&message))
                {
                    warn!(run_id = run.id, error = %finalize_err, "run finalization failed");
                }
                Err(err)
            }
        }
    }

    fn run_import(
        &self,
        run_id: i64,
        provider: Provider,
        filename: &str,
        bytes: &[u8],
    ) -> Result<i64> {
        let is_zip = extension(filename) == "zip";
        let artifact_type = if is_zip {
            "zip".to_string()
        } else {
            let ext = extension(filename);
            if ext.is_empty() {
                "json".to_string()
            } else {
                ext
            }
        };

        let parent = self.store.store_raw_artifact(&NewArtifact {
            run_id,
            parent_artifact_id: None,
            provider,
            artifact_type: &artifact_type,
            filename,
            path_in_container: None,
            bytes,
        })?;

        if is_zip {
            self.import_archive(run_id, provider, parent.id, bytes)?;
        } else {
            let text = utf8_text(bytes)?;
            let scope = ParseScope {
                run_id,
                artifact_id: parent.id,
            };
            let kind = parsers::default_for_provider(provider);
            self.store
                .in_transaction(|conn| parsers::run(kind, conn, &scope, text))?;
        }

        Ok(parent.id)
    }

    /// Pre-scan, then extract and dispatch each entry.
    ///
    /// Every entry becomes a child artifact whether or not a parser claims
    /// it. Parseable entries run in their own transaction: one bad entry
    /// keeps its siblings' yield. The run only fails when nothing at all
    /// parsed — a failed run never carries threads or messages.
    fn import_archive(
        &self,
        run_id: i64,
        provider: Provider,
        parent_id: i64,
        bytes: &[u8],
    ) -> Result<()> {
        archive::pre_scan(bytes, &self.limits)?;

        let mut zip = archive::open(bytes)?;

        // Strict fallback: when the canonical JSON export is present, the
        // HTML rendition is stored but never parsed, so messages are not
        // imported twice.
        let has_json_export = (0..zip.len()).any(|i| {
            zip.by_index_raw(i).is_ok_and(|entry| {
                parsers::select(provider, entry.name()) == Some(ParserKind::ChatgptJson)
            })
        });

        let mut parsed_entries = 0usize;
        let mut first_parse_error: Option<VaultError> = None;

        for index in 0..zip.len() {
            let (name, is_dir) = {
                let entry = zip.by_index_raw(index).map_err(|e| VaultError::ZipCorrupt {
                    message: format!("entry {index} unreadable: {e}"),
                })?;
                (entry.name().to_string(), entry.is_dir())
            };
            if is_dir {
                continue;
            }

            let entry_bytes = archive::read_entry(&mut zip, index, &self.limits)?;
            let entry_type = {
                let ext = extension(&name);
                if ext.is_empty() {
                    "bin".to_string()
                } else {
                    ext
                }
            };

            let child = self.store.store_raw_artifact(&NewArtifact {
                run_id,
                parent_artifact_id: Some(parent_id),
                provider,
                artifact_type: &entry_type,
                filename: &sanitize_basename(&name),
                path_in_container: Some(&name),
                bytes: &entry_bytes,
            })?;

            let Some(kind) = parsers::select(provider, &name) else {
                debug!(entry = %name, "stored without parsing");
                continue;
            };
            if kind == ParserKind::ChatgptHtml && has_json_export {
                debug!(entry = %name, "html fallback skipped, json export present");
                continue;
            }

            let scope = ParseScope {
                run_id,
                artifact_id: child.id,
            };
            let parsed = utf8_text(&entry_bytes).and_then(|text| {
                self.store
                    .in_transaction(|conn| parsers::run(kind, conn, &scope, text))
            });
            match parsed {
                Ok(stats) => {
                    parsed_entries += 1;
                    debug!(
                        entry = %name,
                        threads = stats.threads,
                        messages = stats.messages,
                        "entry parsed"
                    );
                }
                Err(err) => {
                    warn!(entry = %name, error = %err, "entry failed to parse");
                    if first_parse_error.is_none() {
                        first_parse_error = Some(err);
                    }
                }
            }
        }

        // Zero yield: surface the first parser error rather than completing
        // an import that produced nothing.
        if parsed_entries == 0 {
            if let Some(err) = first_parse_error {
                return Err(err);
            }
        }
        Ok(())
    }
}

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn utf8_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|e| VaultError::Other(format!("input is not valid UTF-8: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
