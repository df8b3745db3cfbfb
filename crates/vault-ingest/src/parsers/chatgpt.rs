//! ChatGPT `conversations.json` parser.
//!
//! The export is an array of conversation objects, each carrying a
//! `mapping` from node id to `{message, parent}`. Only nodes whose content
//! type is `text` are imported; tool calls, images, and other content types
//! are counted and skipped. Positions follow the mapping's own key order —
//! the export writes nodes in conversation order and `serde_json` preserves
//! it.

use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use vault_core::{Provider, Result, VaultError};
use vault_store::repositories::message::{MessageRepo, NewMessage};
use vault_store::repositories::thread::{NewThread, ThreadRepo};

use super::{ParseScope, ParseStats};

pub fn parse(conn: &Connection, scope: &ParseScope, text: &str) -> Result<ParseStats> {
    let root: Value = serde_json::from_str(text)?;
    let conversations = root.as_array().ok_or_else(|| VaultError::SchemaMismatch {
        message: "expected a top-level conversation array".into(),
    })?;

    let mut stats = ParseStats::default();

    for conversation in conversations {
        let mapping = conversation
            .get("mapping")
            .and_then(Value::as_object)
            .ok_or_else(|| VaultError::SchemaMismatch {
                message: "conversation without a mapping object".into(),
            })?;

        let provider_thread_id = conversation.get("id").and_then(Value::as_str);
        let title = conversation
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled");
        let created_at = conversation
            .get("create_time")
            .and_then(Value::as_f64)
            .map(seconds_to_ms);

        let thread_id = ThreadRepo::insert(
            conn,
            &NewThread {
                provider: Provider::Chatgpt,
                provider_thread_id,
                title,
                created_at,
                artifact_id: scope.artifact_id,
                run_id: scope.run_id,
            },
        )?;
        stats.threads += 1;

        let mut position: i64 = 0;
        for (node_id, node) in mapping {
            let Some(message) = node.get("message").filter(|m| !m.is_null()) else {
                continue;
            };

            let content_type = message
                .get("content")
                .and_then(|c| c.get("content_type"))
                .and_then(Value::as_str);
            if content_type != Some("text") {
                stats.skipped_non_text += 1;
                continue;
            }

            let parts: Vec<&str> = message
                .get("content")
                .and_then(|c| c.get("parts"))
                .and_then(Value::as_array)
                .map(|parts| parts.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let content = parts.join("\n");

            let role = message
                .get("author")
                .and_then(|a| a.get("role"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let timestamp = message
                .get("create_time")
                .and_then(Value::as_f64)
                .map(seconds_to_ms);
            let provider_message_id = message
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(node_id.as_str());
            let parent = node.get("parent").and_then(Value::as_str);

            let plain = strip_markup(&content);
            MessageRepo::insert(
                conn,
                &NewMessage {
                    thread_id,
                    provider: Provider::Chatgpt,
                    provider_message_id: Some(provider_message_id),
                    role,
                    content: &content,
                    content_plain: &plain,
                    timestamp,
                    position,
                    parent_provider_message_id: parent,
                    artifact_id: scope.artifact_id,
                    run_id: scope.run_id,
                },
            )?;
            position += 1;
            stats.messages += 1;
        }
    }

    debug!(
        threads = stats.threads,
        messages = stats.messages,
        skipped_non_text = stats.skipped_non_text,
        "chatgpt conversations parsed"
    );
    Ok(stats)
}

fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0) as i64
}

/// Plain-text normalization: drop the markdown markers the model emits.
fn strip_markup(content: &str) -> String {
    content
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`'))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
