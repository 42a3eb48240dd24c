use serde::{Deserialize, Serialize};

/// Terms rejected when no list is configured.
const DEFAULT_BLOCKED_TERMS: &[&str] = &[
    "fuck",
    "fucking",
    "motherfucker",
    "shit",
    "bitch",
    "bastard",
    "asshole",
    "cunt",
    "whore",
    "kill yourself",
    "heil hitler",
];

/// Moderation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// When false every text passes.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Disallowed words or phrases, matched as whole words, case-insensitively.
    #[serde(default = "default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            blocked_terms: default_blocked_terms(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_blocked_terms() -> Vec<String> {
    DEFAULT_BLOCKED_TERMS.iter().map(|t| t.to_string()).collect()
}
