//! RPC method handlers.
//!
//! One dispatch function over shared state. Import failures surface their
//! wire-contract code in the error envelope; the run row already holds the
//! durable record by the time the response leaves.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tracing::instrument;

use vault_core::Provider;
use vault_ingest::Importer;
use vault_store::VaultStore;

use crate::diagnostics;
use crate::rpc::{require_str, RpcRequest, RpcResponse};

/// Shared state behind every RPC method.
pub struct HandlerState {
    store: Arc<VaultStore>,
    importer: Importer,
}

impl HandlerState {
    #[must_use]
    pub fn new(store: Arc<VaultStore>) -> Self {
        let importer = Importer::new(store.clone());
        Self { store, importer }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<VaultStore> {
        &self.store
    }
}

/// Route one request to its handler.
#[instrument(skip(state, request), fields(method = %request.method))]
pub fn dispatch(state: &HandlerState, request: RpcRequest) -> RpcResponse {
    let RpcRequest { method, params, id } = request;
    match method.as_str() {
        "status" => handle_status(state, id),
        "search.query" => handle_search(state, params.as_ref(), id),
        "import.headless" => handle_import(state, params.as_ref(), id),
        "vault.wipe" => handle_wipe(state, id),
        "diagnostics.generate" => handle_diagnostics(state, id),
        other => RpcResponse::method_not_found(id, other),
    }
}

fn handle_status(state: &HandlerState, id: Option<serde_json::Value>) -> RpcResponse {
    RpcResponse::success(
        id,
        json!({
            "status": "secure",
            "localOnly": true,
            "vaultPath": state.store.paths().vault().to_string_lossy(),
        }),
    )
}

fn handle_search(
    state: &HandlerState,
    params: Option<&serde_json::Value>,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let query = match require_str(params, "query") {
        Ok(query) => query,
        Err(message) => return RpcResponse::invalid_params(id, message),
    };
    match state.store.search(query) {
        Ok(hits) => RpcResponse::success(id, json!({ "hits": hits })),
        Err(err) => RpcResponse::error(id, err.code().as_str(), err.to_string()),
    }
}

fn handle_import(
    state: &HandlerState,
    params: Option<&serde_json::Value>,
    id: Option<serde_json::Value>,
) -> RpcResponse {
    let provider = match require_str(params, "provider") {
        Ok(raw) => match raw.parse::<Provider>() {
            Ok(provider) => provider,
            Err(message) => return RpcResponse::invalid_params(id, message),
        },
        Err(message) => return RpcResponse::invalid_params(id, message),
    };
    let path = match require_str(params, "path") {
        Ok(path) => PathBuf::from(path),
        Err(message) => return RpcResponse::invalid_params(id, message),
    };

    match state.importer.import_headless(provider, &path) {
        Ok(outcome) => RpcResponse::success(
            id,
            json!({
                "success": true,
                "runId": outcome.run_id,
                "artifactId": outcome.artifact_id,
            }),
        ),
        Err(err) => RpcResponse::error(id, err.code().as_str(), err.to_string()),
    }
}

fn handle_wipe(state: &HandlerState, id: Option<serde_json::Value>) -> RpcResponse {
    match state.store.wipe() {
        Ok(()) => RpcResponse::success(id, json!({ "success": true })),
        Err(err) => RpcResponse::error(id, err.code().as_str(), err.to_string()),
    }
}

fn handle_diagnostics(state: &HandlerState, id: Option<serde_json::Value>) -> RpcResponse {
    match diagnostics::generate(&state.store) {
        Ok(report) => match serde_json::to_value(&report) {
            Ok(value) => RpcResponse::success(id, value),
            Err(err) => RpcResponse::error(id, "UNKNOWN_ERROR", err.to_string()),
        },
        Err(err) => RpcResponse::error(id, err.code().as_str(), err.to_string()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use vault_core::VaultPaths;

    fn state() -> (HandlerState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = VaultPaths::new(dir.path().join("user-data"));
        let store = Arc::new(VaultStore::open(&paths).unwrap());
        (HandlerState::new(store), dir)
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            method: method.to_string(),
            params: Some(params),
            id: Some(json!(1)),
        }
    }

    fn chatgpt_fixture(dir: &std::path::Path) -> PathBuf {
        let export = r#"[{
            "id": "c1", "title": "t", "create_time": 1700000000.0,
            "mapping": {
                "n1": {
                    "message": {
                        "id": "m1",
                        "author": {"role": "user"},
                        "content": {"content_type": "text", "parts": ["RPC_SENTINEL body"]},
                        "create_time": 1700000001.0
                    },
                    "parent": null
                }
            }
        }]"#;
        let path = dir.join("conversations.json");
        std::fs::write(&path, export).unwrap();
        path
    }

    #[test]
    fn status_reports_secure_local_vault() {
        let (state, _dir) = state();
        let resp = dispatch(&state, request("status", json!({})));
        assert!(resp.success);
        let result = resp.result.unwrap();
        assert_eq!(result["status"], "secure");
        assert_eq!(result["localOnly"], true);
        assert!(result["vaultPath"].as_str().unwrap().ends_with("vault"));
    }

    #[test]
    fn import_then_search_round_trip() {
        let (state, dir) = state();
        let fixture = chatgpt_fixture(dir.path());

        let resp = dispatch(
            &state,
            request(
                "import.headless",
                json!({"provider": "chatgpt", "path": fixture.to_string_lossy()}),
            ),
        );
        assert!(resp.success, "import failed: {:?}", resp.error);
        let result = resp.result.unwrap();
        assert_eq!(result["success"], true);
        assert!(result["runId"].as_i64().unwrap() >= 1);

        let resp = dispatch(&state, request("search.query", json!({"query": "RPC_SENTINEL"})));
        assert!(resp.success);
        let hits = resp.result.unwrap()["hits"].as_array().unwrap().clone();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["provider"], "chatgpt");
        assert_eq!(hits[0]["role"], "user");
        assert!(hits[0]["content"].as_str().unwrap().contains("RPC_SENTINEL"));
    }

    #[test]
    fn import_failure_carries_wire_code() {
        let (state, dir) = state();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();

        let resp = dispatch(
            &state,
            request(
                "import.headless",
                json!({"provider": "claude", "path": path.to_string_lossy()}),
            ),
        );
        assert!(!resp.success);
        let error = resp.error.unwrap();
        assert_eq!(error.code, "PARSE_JSON_FAILED");
        assert!(error.message.starts_with("PARSE_JSON_FAILED"));
    }

    #[test]
    fn unknown_provider_is_invalid_params() {
        let (state, _dir) = state();
        let resp = dispatch(
            &state,
            request(
                "import.headless",
                json!({"provider": "copilot", "path": "/tmp/x.json"}),
            ),
        );
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");
    }

    #[test]
    fn missing_query_is_invalid_params() {
        let (state, _dir) = state();
        let resp = dispatch(&state, request("search.query", json!({})));
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "INVALID_PARAMS");
    }

    #[test]
    fn wipe_clears_search() {
        let (state, dir) = state();
        let fixture = chatgpt_fixture(dir.path());
        dispatch(
            &state,
            request(
                "import.headless",
                json!({"provider": "chatgpt", "path": fixture.to_string_lossy()}),
            ),
        );

        let resp = dispatch(&state, request("vault.wipe", json!({})));
        assert!(resp.success);
        assert_eq!(resp.result.unwrap()["success"], true);

        let resp = dispatch(&state, request("search.query", json!({"query": "RPC_SENTINEL"})));
        assert!(resp.result.unwrap()["hits"].as_array().unwrap().is_empty());
    }

    #[test]
    fn diagnostics_has_contracted_sections() {
        let (state, _dir) = state();
        let resp = dispatch(&state, request("diagnostics.generate", json!({})));
        assert!(resp.success);
        let report = resp.result.unwrap();
        for section in ["generated_at", "app", "runtime", "vault", "ingestion", "artifacts", "health"] {
            assert!(report.get(section).is_some(), "missing section {section}");
        }
        assert_eq!(report["vault"]["fts_enabled"], true);
        assert_eq!(report["health"]["sqlite_integrity_check"], "ok");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let (state, _dir) = state();
        let resp = dispatch(&state, request("vault.selfDestruct", json!({})));
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap().code, "METHOD_NOT_FOUND");
    }
}
