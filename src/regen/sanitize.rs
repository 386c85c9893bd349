//! Recover bare HTML from the model's final text.

/// Strip a leading code fence (with or without a language tag), a trailing
/// fence and surrounding whitespace. Clean HTML passes through unchanged, so
/// applying this twice is the same as applying it once.
pub fn sanitize_html(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // The info string (`html`, `HTML`, ...) ends at the first
        // non-alphanumeric char, which may be the markup itself.
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = rest[tag_len..].trim_start();
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }

    text.trim().to_string()
}
