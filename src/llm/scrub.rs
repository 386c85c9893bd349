use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Prefixes that start a Google credential or a bearer-style token.
const TOKEN_PREFIXES: [&str; 4] = ["AIza", "ya29.", "GOCSPX-", "eyJ"];

/// Markers whose following token is a secret value.
const VALUE_MARKERS: [&str; 9] = [
    "key=",
    "api_key=",
    "access_token=",
    "x-goog-api-key: ",
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"api_key\":\"",
    "\"access_token\":\"",
    "\"client_secret\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '+' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|&(_, c)| !is_secret_char(c))
        .map_or(input.len(), |(i, _)| from + i)
}

/// Replace everything after each `marker` occurrence up to the end of the
/// token. `keep_marker` leaves the marker itself readable.
fn redact_after(scrubbed: &mut String, marker: &str, keep_marker: bool) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let value_start = start + marker.len();
        let end = token_end(scrubbed, value_start);
        if end == value_start {
            search_from = value_start;
            continue;
        }
        let replace_from = if keep_marker { value_start } else { start };
        scrubbed.replace_range(replace_from..end, REDACTED);
        search_from = replace_from + REDACTED.len();
    }
}

/// Scrub Google API keys, OAuth tokens and credential-bearing query or header
/// fragments from text that may be logged or returned to a client.
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    let hit = TOKEN_PREFIXES
        .iter()
        .chain(VALUE_MARKERS.iter())
        .any(|pattern| input.contains(pattern));
    if !hit {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in VALUE_MARKERS {
        redact_after(&mut scrubbed, marker, true);
    }
    for prefix in TOKEN_PREFIXES {
        redact_after(&mut scrubbed, prefix, false);
    }
    Cow::Owned(scrubbed)
}

/// Scrub and truncate upstream error text.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    crate::util::truncate_with_ellipsis(scrubbed.trim(), MAX_API_ERROR_CHARS)
}

/// Build a sanitized error from a failed HTTP response.
pub async fn api_error(upstream: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    anyhow::anyhow!("{upstream} API error ({status}): {}", sanitize_api_error(&body))
}
