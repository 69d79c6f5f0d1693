//! Page text clean-up.

/// Collapse every whitespace run to a single space and trim the ends.
#[must_use]
pub fn normalize_content_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
