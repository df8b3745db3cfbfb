//! Claude export parser.
//!
//! The export is an array of conversations with `chat_messages`. Shapes are
//! typed with optional fields; the sender string is stored as the role
//! verbatim.

use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use vault_core::{Provider, Result, VaultError};
use vault_store::repositories::message::{MessageRepo, NewMessage};
use vault_store::repositories::thread::{NewThread, ThreadRepo};

use super::{iso_to_epoch_ms, ParseScope, ParseStats};

#[derive(Debug, Deserialize)]
struct Conversation {
    uuid: Option<String>,
    name: Option<String>,
    created_at: Option<String>,
    chat_messages: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    uuid: Option<String>,
    sender: Option<String>,
    text: Option<String>,
    created_at: Option<String>,
}

pub fn parse(conn: &Connection, scope: &ParseScope, text: &str) -> Result<ParseStats> {
    // Two-step parse keeps the error taxonomy honest: invalid JSON is a
    // parse failure, valid JSON of the wrong shape is a schema mismatch.
    let root: Value = serde_json::from_str(text)?;
    let conversations: Vec<Conversation> =
        serde_json::from_value(root).map_err(|e| VaultError::SchemaMismatch {
            message: format!("not a Claude conversation array: {e}"),
        })?;

    if !conversations.is_empty() && conversations.iter().all(|c| c.chat_messages.is_none()) {
        return Err(VaultError::SchemaMismatch {
            message: "no conversation carries chat_messages".into(),
        });
    }

    let mut stats = ParseStats::default();

    for conversation in &conversations {
        let title = conversation
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Untitled");
        let created_at = conversation
            .created_at
            .as_deref()
            .and_then(iso_to_epoch_ms);

        let thread_id = ThreadRepo::insert(
            conn,
            &NewThread {
                provider: Provider::Claude,
                provider_thread_id: conversation.uuid.as_deref(),
                title,
                created_at,
                artifact_id: scope.artifact_id,
                run_id: scope.run_id,
            },
        )?;
        stats.threads += 1;

        let messages = conversation.chat_messages.as_deref().unwrap_or_default();
        for (position, message) in messages.iter().enumerate() {
            let content = message.text.as_deref().unwrap_or_default();
            let role = message.sender.as_deref().unwrap_or("unknown");
            let timestamp = message.created_at.as_deref().and_then(iso_to_epoch_ms);

            MessageRepo::insert(
                conn,
                &NewMessage {
                    thread_id,
                    provider: Provider::Claude,
                    provider_message_id: message.uuid.as_deref(),
                    role,
                    content,
                    content_plain: content,
                    timestamp,
                    position: position as i64,
                    parent_provider_message_id: None,
                    artifact_id: scope.artifact_id,
                    run_id: scope.run_id,
                },
            )?;
            stats.messages += 1;
        }
    }

    debug!(
        threads = stats.threads,
        messages = stats.messages,
        "claude export parsed"
    );
    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
