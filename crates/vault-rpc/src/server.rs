//! HTTP server hosting the RPC surface.
//!
//! Two routes: `GET /health` for the host shell's liveness probe and
//! `POST /rpc` for everything else. Binds loopback only — the vault is
//! local-first and nothing should reach it from off the machine.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{dispatch, HandlerState};
use crate::rpc::{RpcRequest, RpcResponse};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind on loopback (0 for auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 9478 }
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Signal shutdown and wait for the listener to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Build the router over shared handler state.
pub fn build_router(state: Arc<HandlerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/rpc", post(rpc_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the returned handle is shut down.
pub async fn serve(config: ServerConfig, state: Arc<HandlerState>) -> std::io::Result<ServerHandle> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await?;
    let port = listener.local_addr()?.port();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    info!(port, "rpc server listening on loopback");

    Ok(ServerHandle {
        port,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn rpc_handler(
    State(state): State<Arc<HandlerState>>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    Json(dispatch(&state, request))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
