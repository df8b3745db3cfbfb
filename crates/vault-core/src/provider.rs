//! Provider tags for the three supported export formats.

use serde::{Deserialize, Serialize};

/// A chat provider whose export bundles the vault understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Chatgpt,
    Claude,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Chatgpt, Provider::Claude, Provider::Gemini];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Chatgpt => "chatgpt",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" => Ok(Provider::Chatgpt),
            "claude" => Ok(Provider::Claude),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider tag: {other}")),
        }
    }
}
