//! Text helpers shared across crates.

/// Truncate to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate to `max_chars` characters and append `...` when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let truncated = truncate_chars(text, max_chars);
    if truncated.len() < text.len() {
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
