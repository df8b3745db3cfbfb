//! RPC surface consumed by the host shell.
//!
//! A small HTTP server: `GET /health` for liveness and `POST /rpc` with a
//! JSON envelope `{method, params?, id?}`. Responses carry string error
//! codes — for import failures those are the vault's wire-contract codes.

pub mod diagnostics;
pub mod handlers;
pub mod rpc;
pub mod server;

pub use handlers::HandlerState;
pub use rpc::{RpcRequest, RpcResponse};
pub use server::{serve, ServerConfig, ServerHandle};
