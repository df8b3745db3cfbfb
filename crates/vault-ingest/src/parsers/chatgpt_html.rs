//! ChatGPT `chat.html` fallback parser.
//!
//! Explicitly best-effort: regex-scans `<div class="message">` blocks and
//! pulls the author and content divs out of each. Content divs in these
//! exports hold flat markup, so a lazy match to the first closing tag is
//! the right trade. No blocks at all means the file is not the export we
//! expect.

use std::sync::OnceLock;

use regex::Regex;
use rusqlite::Connection;
use tracing::debug;

use vault_core::{Provider, Result, VaultError};
use vault_store::repositories::message::{MessageRepo, NewMessage};
use vault_store::repositories::thread::{NewThread, ThreadRepo};

use super::{ParseScope, ParseStats};

fn message_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<div class="message">.*?<div class="author">(?P<author>.*?)</div>.*?<div class="content">(?P<content>.*?)</div>"#,
        )
        .expect("static pattern")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<title>(?P<title>.*?)</title>").expect("static pattern"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

pub fn parse(conn: &Connection, scope: &ParseScope, text: &str) -> Result<ParseStats> {
    let blocks: Vec<(String, String)> = message_re()
        .captures_iter(text)
        .map(|caps| (caps["author"].to_string(), caps["content"].to_string()))
        .collect();

    if blocks.is_empty() {
        return Err(VaultError::HtmlNoMessages);
    }

    let title = title_re()
        .captures(text)
        .map(|caps| strip_tags(&caps["title"]))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Imported chat".to_string());

    let thread_id = ThreadRepo::insert(
        conn,
        &NewThread {
            provider: Provider::Chatgpt,
            provider_thread_id: None,
            title: &title,
            created_at: None,
            artifact_id: scope.artifact_id,
            run_id: scope.run_id,
        },
    )?;

    let mut stats = ParseStats {
        threads: 1,
        ..ParseStats::default()
    };

    for (position, (author, content)) in blocks.iter().enumerate() {
        let role = strip_tags(author);
        let role = if role.is_empty() {
            "unknown"
        } else {
            role.as_str()
        };

        MessageRepo::insert(
            conn,
            &NewMessage {
                thread_id,
                provider: Provider::Chatgpt,
                provider_message_id: None,
                role,
                content,
                content_plain: &strip_tags(content),
                timestamp: None,
                position: position as i64,
                parent_provider_message_id: None,
                artifact_id: scope.artifact_id,
                run_id: scope.run_id,
            },
        )?;
        stats.messages += 1;
    }

    debug!(messages = stats.messages, "chat.html fallback parsed");
    Ok(stats)
}

/// Drop every tag, decode the handful of entities these exports use, and
/// trim.
fn strip_tags(fragment: &str) -> String {
    let text = tag_re().replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
