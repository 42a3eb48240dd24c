//! Turns one generated text into two titled drafts.

use crate::order::{LyricDraft, MAX_TITLE_CHARS};

/// Title used when a draft has no usable title line.
pub const DEFAULT_TITLE: &str = "Untitled Song";

fn is_delimiter(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

fn is_numbered_marker(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with('.')
}

/// Split generated text into exactly two draft texts.
///
/// Prefers a delimiter line of three or more dashes; extra parts beyond the
/// second are dropped. Without a usable delimiter the paragraphs are split at
/// the midpoint (first half rounds down, at least one paragraph per side).
/// Returns `None` when the text holds fewer than two paragraphs.
pub fn split_drafts(text: &str) -> Option<[String; 2]> {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_delimiter(line) {
            parts.push(current.join("\n"));
            current.clear();
        } else {
            current.push(line);
        }
    }
    parts.push(current.join("\n"));

    let parts: Vec<String> = parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() >= 2 {
        let mut parts = parts.into_iter();
        return Some([parts.next()?, parts.next()?]);
    }

    let paragraphs = paragraphs(&parts.join("\n\n"));
    if paragraphs.len() < 2 {
        return None;
    }

    let mid = (paragraphs.len() / 2).max(1);
    Some([
        paragraphs[..mid].join("\n\n"),
        paragraphs[mid..].join("\n\n"),
    ])
}

/// Paragraphs separated by blank lines, trimmed, empty ones dropped.
fn paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// Find the title line of a draft.
///
/// Returns the index of the line within `lines` and the cleaned title.
fn find_title(lines: &[&str]) -> Option<(usize, String)> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        if line.starts_with('#') || line.starts_with('[') || is_numbered_marker(line) {
            return None;
        }
        let title = clean_title(line);
        if title.is_empty() {
            None
        } else {
            Some((idx, title))
        }
    })
}

fn clean_title(line: &str) -> String {
    let mut title = line.trim();

    if let Some(prefix) = title.get(..6) {
        if prefix.eq_ignore_ascii_case("title:") {
            title = title[6..].trim();
        }
    }

    let title = title
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '“' || c == '”')
        .trim();

    title.chars().take(MAX_TITLE_CHARS).collect()
}

/// Extract a draft's title, falling back to [`DEFAULT_TITLE`].
pub fn extract_title(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    find_title(&lines)
        .map(|(_, title)| title)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Build a draft from one part of the generated text.
///
/// The body is every other non-empty line. A draft made of nothing but its
/// title line keeps that line as the body.
pub fn parse_draft(text: &str) -> LyricDraft {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    match find_title(&lines) {
        Some((idx, title)) => {
            let body: Vec<&str> = lines
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, l)| *l)
                .collect();
            let body = if body.is_empty() {
                lines[idx].to_string()
            } else {
                body.join("\n")
            };
            LyricDraft { title, body }
        }
        None => LyricDraft {
            title: DEFAULT_TITLE.to_string(),
            body: lines.join("\n"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_delimiter() {
        let [a, b] = split_drafts("A\n---\nB").unwrap();
        assert_eq!(a, "A");
        assert_eq!(b, "B");
    }

    #[test]
    fn test_split_delimiter_with_blank_lines_and_long_dashes() {
        let [a, b] = split_drafts("First\nline\n\n-----\n\nSecond\n").unwrap();
        assert_eq!(a, "First\nline");
        assert_eq!(b, "Second");
    }

    #[test]
    fn test_split_keeps_first_two_parts() {
        let [a, b] = split_drafts("A\n---\nB\n---\nC").unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("A", "B"));
    }

    #[test]
    fn test_inline_dashes_are_not_delimiters() {
        let [a, b] = split_drafts("one --- two\n\nthree").unwrap();
        assert_eq!(a, "one --- two");
        assert_eq!(b, "three");
    }

    #[test]
    fn test_split_four_paragraphs_at_midpoint() {
        let [a, b] = split_drafts("P1\n\nP2\n\nP3\n\nP4").unwrap();
        assert_eq!(a, "P1\n\nP2");
        assert_eq!(b, "P3\n\nP4");
    }

    #[test]
    fn test_split_odd_paragraph_count_rounds_down() {
        let [a, b] = split_drafts("P1\n\nP2\n\nP3").unwrap();
        assert_eq!(a, "P1");
        assert_eq!(b, "P2\n\nP3");
    }

    #[test]
    fn test_single_part_with_trailing_delimiter_falls_back_to_paragraphs() {
        let [a, b] = split_drafts("P1\n\nP2\n---\n").unwrap();
        assert_eq!((a.as_str(), b.as_str()), ("P1", "P2"));
    }

    #[test]
    fn test_single_paragraph_cannot_split() {
        assert!(split_drafts("just one\nparagraph").is_none());
        assert!(split_drafts("   ").is_none());
    }

    #[test]
    fn test_title_skips_section_markers() {
        assert_eq!(extract_title("[Verse]\nHello World\nline two"), "Hello World");
        assert_eq!(extract_title("# Heading\n1. first\nReal Title"), "Real Title");
    }

    #[test]
    fn test_title_strips_label_and_quotes() {
        assert_eq!(extract_title("Title: \"Sail Away\"\nla la"), "Sail Away");
        assert_eq!(extract_title("**Biscuit's Song**\nwoof"), "Biscuit's Song");
    }

    #[test]
    fn test_title_defaults_when_missing() {
        assert_eq!(extract_title("[Chorus]\n# only markers"), DEFAULT_TITLE);
        assert_eq!(extract_title(""), DEFAULT_TITLE);
    }

    #[test]
    fn test_title_is_truncated() {
        let long = "x".repeat(300);
        assert_eq!(extract_title(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_parse_draft_body_excludes_title_line() {
        let draft = parse_draft("[Verse]\nHello World\n\nline two\n");
        assert_eq!(draft.title, "Hello World");
        assert_eq!(draft.body, "[Verse]\nline two");
    }

    #[test]
    fn test_parse_draft_title_only() {
        let draft = parse_draft("Lonely Title");
        assert_eq!(draft.title, "Lonely Title");
        assert_eq!(draft.body, "Lonely Title");
    }

    #[test]
    fn test_parse_draft_without_title() {
        let draft = parse_draft("[Verse]\n# Chorus");
        assert_eq!(draft.title, DEFAULT_TITLE);
        assert_eq!(draft.body, "[Verse]\n# Chorus");
    }
}
