//! UTF-8-safe string truncation
//!
//! Page text arrives in every script and language the web has to offer, so
//! all budget enforcement counts characters, never bytes.

/// Truncate to at most `max_chars` Unicode characters.
///
/// ```
/// # use seo_audit::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("Grüße aus Köln", 5), "Grüße");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Byte index of the last word boundary within the first `max_chars` characters.
///
/// Falls back to the `max_chars`-th character when no boundary exists, and to
/// the string length when the string is already short enough.
///
/// ```
/// # use seo_audit::utils::string_utils::safe_truncate_boundary;
/// let text = "Hello, wonderful world of Unicode!";
/// let idx = safe_truncate_boundary(text, 20, " ,;:");
/// assert_eq!(&text[..idx], "Hello, wonderful");
/// ```
pub fn safe_truncate_boundary(s: &str, max_chars: usize, boundary_chars: &str) -> usize {
    let max_byte_idx = s
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());

    if max_byte_idx == s.len() {
        return max_byte_idx;
    }

    s[..max_byte_idx]
        .rfind(|c: char| c.is_whitespace() || boundary_chars.contains(c))
        .unwrap_or(max_byte_idx)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````) from model output.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}
