//! Payload Redaction
//!
//! Image uploads travel as base64 data URLs; writing them to a log line
//! floods the file. These helpers shorten payloads before logging.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static DATA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:([\w/+.\-]+);base64,([A-Za-z0-9+/]+=*)").unwrap());

static BASE64_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/]{256,}={0,2}").unwrap());

/// Replace data URLs and long base64 runs with a size placeholder.
pub fn redact_payload(input: &str) -> String {
    let redacted = DATA_URL_RE.replace_all(input, |caps: &Captures| {
        format!("data:{};base64,[{} bytes]", &caps[1], caps[2].len() * 3 / 4)
    });
    BASE64_RUN_RE
        .replace_all(&redacted, |caps: &Captures| format!("[base64 {} chars]", caps[0].len()))
        .into_owned()
}

/// First `max_chars` characters of `text` on one line, marked when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let mut chars = flat.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
