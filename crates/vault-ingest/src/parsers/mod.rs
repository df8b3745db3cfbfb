//! Provider parsers.
//!
//! All four parsers share one shape: given a connection (inside the
//! controller's transaction), the scope identifying the run and source
//! artifact, and the entry's text content, they insert threads and messages
//! and report counts. Dispatch is driven entirely by (provider tag, entry
//! name).

pub mod chatgpt;
pub mod chatgpt_html;
pub mod claude;
pub mod gemini;

use rusqlite::Connection;

use vault_core::{Provider, Result};

/// Identifies the run and artifact a parse writes under.
#[derive(Debug, Clone, Copy)]
pub struct ParseScope {
    pub run_id: i64,
    pub artifact_id: i64,
}

/// Counters reported by one parser invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub threads: usize,
    pub messages: usize,
    /// ChatGPT nodes skipped because their content type is not text.
    pub skipped_non_text: usize,
}

/// Which parser handles an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    ChatgptJson,
    ChatgptHtml,
    ClaudeJson,
    GeminiJson,
}

/// Select a parser for an archive entry, or `None` to store the entry
/// without parsing.
#[must_use]
pub fn select(provider: Provider, entry_name: &str) -> Option<ParserKind> {
    match provider {
        Provider::Chatgpt => {
            if entry_name == "conversations.json" || entry_name.ends_with("/conversations.json") {
                Some(ParserKind::ChatgptJson)
            } else if entry_name == "chat.html" || entry_name.ends_with("/chat.html") {
                Some(ParserKind::ChatgptHtml)
            } else {
                None
            }
        }
        Provider::Claude => entry_name
            .ends_with(".json")
            .then_some(ParserKind::ClaudeJson),
        Provider::Gemini => entry_name
            .ends_with(".json")
            .then_some(ParserKind::GeminiJson),
    }
}

/// The parser for a bare (non-archive) file of this provider.
#[must_use]
pub fn default_for_provider(provider: Provider) -> ParserKind {
    match provider {
        Provider::Chatgpt => ParserKind::ChatgptJson,
        Provider::Claude => ParserKind::ClaudeJson,
        Provider::Gemini => ParserKind::GeminiJson,
    }
}

/// Run one parser over entry text.
pub fn run(
    kind: ParserKind,
    conn: &Connection,
    scope: &ParseScope,
    text: &str,
) -> Result<ParseStats> {
    match kind {
        ParserKind::ChatgptJson => chatgpt::parse(conn, scope, text),
        ParserKind::ChatgptHtml => chatgpt_html::parse(conn, scope, text),
        ParserKind::ClaudeJson => claude::parse(conn, scope, text),
        ParserKind::GeminiJson => gemini::parse(conn, scope, text),
    }
}

/// Parse an ISO-8601 timestamp to epoch milliseconds.
pub(crate) fn iso_to_epoch_ms(raw: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}
