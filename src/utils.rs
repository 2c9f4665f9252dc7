//! Utility functions for string manipulation and text classification.
//!
//! This module provides helper functions used throughout the engine:
//! - Character-safe truncation for summaries and log lines
//! - Byline/date-marker detection for paragraph filtering
//! - Capitalization for section names inferred from URL paths

/// Lowercase markers of author/date lines that must not be taken as a summary.
const BYLINE_MARKERS: &[&str] = &[
    "por ",
    "by ",
    "publicado",
    "published",
    "actualizado",
    "updated",
    "fecha:",
    "hora:",
];

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        format!("{kept}…(+{} bytes)", s.len() - kept.len())
    }
}

/// Keep at most `max` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// True when a paragraph reads like an author or timestamp line.
pub fn looks_like_byline(text: &str) -> bool {
    let lower = text.to_lowercase();
    BYLINE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Capitalize the first character of a string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(upcase("deportes"), "Deportes");
/// assert_eq!(upcase(""), "");
/// ```
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}
