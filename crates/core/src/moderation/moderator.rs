use regex_lite::Regex;
use tracing::warn;

use super::ModerationConfig;

/// Scans free text for disallowed terms.
///
/// Terms match as whole words, ignoring case. A match must not be preceded or
/// followed by a letter, digit or `_`, so terms starting or ending in
/// punctuation (`@ss`) or non-ASCII letters behave like plain words. Words
/// inside a multi-word term may be separated by any run of whitespace.
pub struct ContentModerator {
    enabled: bool,
    rules: Vec<(String, Regex)>,
}

impl ContentModerator {
    pub fn new(config: &ModerationConfig) -> Self {
        let rules = config
            .blocked_terms
            .iter()
            .filter_map(|term| {
                let words: Vec<String> = term
                    .split_whitespace()
                    .map(|w| regex_lite::escape(&w.to_lowercase()))
                    .collect();
                if words.is_empty() {
                    return None;
                }

                let pattern = words.join(r"\s+");
                match Regex::new(&pattern) {
                    Ok(regex) => Some((term.trim().to_lowercase(), regex)),
                    Err(e) => {
                        warn!(term = %term, error = %e, "Skipping unusable moderation term");
                        None
                    }
                }
            })
            .collect();

        Self {
            enabled: config.enabled,
            rules,
        }
    }

    /// A moderator that accepts everything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
        }
    }

    /// Returns the configured terms found in `text`, in configuration order.
    pub fn scan(&self, text: &str) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }

        let text = text.to_lowercase();
        let mut hits: Vec<String> = Vec::new();
        for (term, regex) in &self.rules {
            if !hits.contains(term) && contains_word(regex, &text) {
                hits.push(term.clone());
            }
        }
        hits
    }

    pub fn is_clean(&self, text: &str) -> bool {
        self.scan(text).is_empty()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `regex` matches somewhere in `text` with no word character directly
/// before or after the match.
fn contains_word(regex: &Regex, text: &str) -> bool {
    let mut start = 0;
    while let Some(m) = regex.find_at(text, start) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        if !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char) {
            return true;
        }
        match text[m.start()..].chars().next() {
            Some(c) => start = m.start() + c.len_utf8(),
            None => return false,
        }
    }
    false
}
