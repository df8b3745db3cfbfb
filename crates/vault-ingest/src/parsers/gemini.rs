//! Gemini export parser.
//!
//! Takeout-style dumps are loose: the message list may sit under
//! `conversations` or `messages`, the text under any of four keys, and the
//! speaker under `author`, `sender`, or `role`. A message record is a
//! struct of optionals and "first non-empty" is the selection rule
//! throughout.

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
    id: Option<String>,
    title: Option<String>,
    created_at: Option<String>,
    conversations: Option<Vec<Message>>,
    messages: Option<Vec<Message>>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: Option<String>,
    author: Option<String>,
    sender: Option<String>,
    role: Option<String>,
    content: Option<String>,
    text: Option<String>,
    prompt_text: Option<String>,
    response_text: Option<String>,
    created_at: Option<String>,
    timestamp: Option<String>,
    time: Option<String>,
}

pub fn parse(conn: &Connection, scope: &ParseScope, text: &str) -> Result<ParseStats> {
    let root: Value = serde_json::from_str(text)?;
    let conversations: Vec<Conversation> =
        serde_json::from_value(root).map_err(|e| VaultError::SchemaMismatch {
            message: format!("not a Gemini conversation array: {e}"),
        })?;

    if !conversations.is_empty()
        && conversations
            .iter()
            .all(|c| c.conversations.is_none() && c.messages.is_none())
    {
        return Err(VaultError::SchemaMismatch {
            message: "no conversation carries a message list".into(),
        });
    }

    let mut stats = ParseStats::default();

    for conversation in &conversations {
        let title = conversation
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Untitled");
        let created_at = conversation
            .created_at
            .as_deref()
            .and_then(iso_to_epoch_ms);

        let thread_id = ThreadRepo::insert(
            conn,
            &NewThread {
                provider: Provider::Gemini,
                provider_thread_id: conversation.id.as_deref(),
                title,
                created_at,
                artifact_id: scope.artifact_id,
                run_id: scope.run_id,
            },
        )?;
        stats.threads += 1;

        let messages = conversation
            .conversations
            .as_deref()
            .or(conversation.messages.as_deref())
            .unwrap_or_default();

        let mut position: i64 = 0;
        for message in messages {
            let Some(content) = first_non_empty([
                message.content.as_deref(),
                message.text.as_deref(),
                message.prompt_text.as_deref(),
                message.response_text.as_deref(),
            ]) else {
                continue;
            };

            let raw_role = first_non_empty([
                message.author.as_deref(),
                message.sender.as_deref(),
                message.role.as_deref(),
            ]);
            let role = normalize_role(raw_role);

            let timestamp = first_non_empty([
                message.created_at.as_deref(),
                message.timestamp.as_deref(),
                message.time.as_deref(),
            ])
            .and_then(iso_to_epoch_ms);

            MessageRepo::insert(
                conn,
                &NewMessage {
                    thread_id,
                    provider: Provider::Gemini,
                    provider_message_id: message.id.as_deref(),
                    role: &role,
                    content,
                    content_plain: content,
                    timestamp,
                    position,
                    parent_provider_message_id: None,
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
        "gemini export parsed"
    );
    Ok(stats)
}

/// First candidate that is non-empty after trimming.
fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Case-insensitive substring mapping of the speaker tag.
fn normalize_role(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "unknown".to_string();
    };
    let lower = raw.to_ascii_lowercase();
    if lower.contains("user") {
        "user".to_string()
    } else if ["gemini", "assistant", "model", "ai"]
        .iter()
        .any(|tag| lower.contains(tag))
    {
        "assistant".to_string()
    } else {
        raw.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use vault_core::ErrorCode;
    use vault_store::migrations::{run_migrations, MigrateOptions};
    use vault_store::repositories::artifact::{ArtifactRepo, NewArtifact};
    use vault_store::repositories::run::RunRepo;

    fn setup() -> (Connection, tempfile::TempDir, ParseScope) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn, &MigrateOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let run = RunRepo::create(&conn, Provider::Gemini, None).unwrap();
        let artifact = ArtifactRepo::store(
            &conn,
            dir.path(),
            &NewArtifact {
                run_id: run.id,
                parent_artifact_id: None,
                provider: Provider::Gemini,
                artifact_type: "json",
                filename: "chats.json",
                path_in_container: None,
                bytes: b"[]",
            },
        )
        .unwrap();
        let scope = ParseScope {
            run_id: run.id,
            artifact_id: artifact.id,
        };
        (conn, dir, scope)
    }

    #[test]
    fn reads_conversations_key() {
        let (conn, _dir, scope) = setup();
        let export = r#"[{
            "title": "Tide tables",
            "conversations": [
                {"author": "User", "prompt_text": "When is low tide?"},
                {"author": "Gemini Pro", "response_text": "Around 14:30 today."}
            ]
        }]"#;
        let stats = parse(&conn, &scope, export).unwrap();
        assert_eq!(stats.threads, 1);
        assert_eq!(stats.messages, 2);

        let rows: Vec<(String, String)> = conn
            .prepare("SELECT role, content FROM messages ORDER BY position")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0], ("user".into(), "When is low tide?".into()));
        assert_eq!(rows[1], ("assistant".into(), "Around 14:30 today.".into()));
    }

    #[test]
    fn reads_messages_key_and_time_fallbacks() {
        let (conn, _dir, scope) = setup();
        let export = r#"[{
            "title": "Alt shape",
            "messages": [
                {"sender": "user", "text": "ping", "time": "1970-01-01T00:00:02Z"},
                {"role": "model", "content": "pong", "timestamp": "1970-01-01T00:00:03Z"}
            ]
        }]"#;
        let stats = parse(&conn, &scope, export).unwrap();
        assert_eq!(stats.messages, 2);

        let timestamps: Vec<i64> = conn
            .prepare("SELECT timestamp FROM messages ORDER BY position")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(timestamps, [2000, 3000]);
    }

    #[test]
    fn unknown_speaker_passes_through() {
        let (conn, _dir, scope) = setup();
        let export = r#"[{
            "title": "t",
            "messages": [{"author": "Narrator", "text": "once upon a time"}]
        }]"#;
        parse(&conn, &scope, export).unwrap();

        let role: String = conn
            .query_row("SELECT role FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(role, "Narrator");
    }

    #[test]
    fn empty_content_rows_are_skipped_but_positions_stay_dense() {
        let (conn, _dir, scope) = setup();
        let export = r#"[{
            "title": "t",
            "messages": [
                {"author": "user", "text": "   "},
                {"author": "user", "text": "first real"},
                {"author": "gemini", "content": "second real"}
            ]
        }]"#;
        let stats = parse(&conn, &scope, export).unwrap();
        assert_eq!(stats.messages, 2);

        let positions: Vec<i64> = conn
            .prepare("SELECT position FROM messages ORDER BY position")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(positions, [0, 1]);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let (conn, _dir, scope) = setup();
        let err = parse(&conn, &scope, "nope").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseJsonFailed);
    }

    #[test]
    fn foreign_array_is_schema_mismatch() {
        let (conn, _dir, scope) = setup();
        let err = parse(&conn, &scope, r#"[{"totally": "different"}]"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchemaMismatch);
    }

    #[test]
    fn first_non_empty_order() {
        assert_eq!(first_non_empty([None, Some(""), Some("x")]), Some("x"));
        assert_eq!(first_non_empty([Some("a"), Some("b")]), Some("a"));
        assert_eq!(first_non_empty::<2>([None, None]), None);
    }

    #[test]
    fn role_mapping_rules() {
        assert_eq!(normalize_role(Some("USER")), "user");
        assert_eq!(normalize_role(Some("Gemini")), "assistant");
        assert_eq!(normalize_role(Some("model-2")), "assistant");
        assert_eq!(normalize_role(Some("AI")), "assistant");
        assert_eq!(normalize_role(Some("Narrator")), "Narrator");
        assert_eq!(normalize_role(None), "unknown");
    }
}
