//! Response parsing: model text → [`FieldRecord`].
//!
//! Models are asked for a single ```` ```json ```` block but routinely add a
//! sentence before or after it, skip the language tag, or drop the fence
//! entirely. The rules here accept all three shapes and nothing more; any
//! answer that still does not parse as a JSON object is a [`ParseError`],
//! which the retry policy treats as final for the document.
//!
//! ## Rule Order
//!
//! 1. Normalise line endings and strip invisible characters (BOM, zero-width
//!    spaces) that break `serde_json`.
//! 2. Take the first ```` ```json ```` block if there is one, else the first
//!    bare ```` ``` ```` block, else the whole text.
//! 3. Parse, require an object, map onto the canonical fields.

use crate::error::ParseError;
use crate::record::FieldRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Parse a raw model answer into a record.
pub fn parse_response(raw: &str) -> Result<FieldRecord, ParseError> {
    let cleaned = remove_invisible_chars(&normalise_line_endings(raw));
    let payload = extract_json_payload(&cleaned).trim();
    if payload.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value =
        serde_json::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    match value {
        Value::Object(ref map) => {
            let record = FieldRecord::from_json_object(map);
            debug!("Parsed record with {} populated fields", record.populated());
            Ok(record)
        }
        other => Err(ParseError::NotAnObject(json_kind(&other))),
    }
}

// ── Fence extraction ─────────────────────────────────────────────────────

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json[ \t]*\n?(.*?)```").unwrap());

static RE_BARE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*\n(.*?)```").unwrap());

/// The JSON text inside the answer, or the whole answer when unfenced.
///
/// An opening ```` ```json ```` with no closing fence yields everything after
/// the marker, since truncated answers usually still hold a usable object.
pub fn extract_json_payload(text: &str) -> &str {
    if let Some(caps) = RE_JSON_FENCE.captures(text) {
        if let Some(m) = caps.get(1) {
            return m.as_str();
        }
    }
    if let Some(start) = find_ascii_case_insensitive(text, "```json") {
        return &text[start + "```json".len()..];
    }
    if let Some(caps) = RE_BARE_FENCE.captures(text) {
        if let Some(m) = caps.get(1) {
            return m.as_str();
        }
    }
    text
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

// ── Text cleanup ─────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{200B}\x{200C}\x{200D}\x{2060}\x{FEFF}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
