//! Content sanitizer: escapes text so it can sit inside a JSON string literal as-is.
//!
//! The escapes are applied in a fixed order (backslash first) so later
//! replacements never re-escape the output of earlier ones. Whatever is still
//! outside printable ASCII afterwards is written as `\uXXXX` UTF-16 units, which
//! makes the result pure ASCII and lets a JSON parser recover the original text.
//!
//! Sanitizing is not idempotent: running it over its own output escapes the
//! backslashes again.

use serde_json::{Map, Value};

const ESCAPES: &[(char, &str)] = &[
    ('\\', "\\\\"),
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\t', "\\t"),
    ('\u{8}', "\\b"),
    ('\u{c}', "\\f"),
    ('"', "\\\""),
];

/// Escape one string for embedding in a JSON string literal.
pub fn json_safe(s: &str) -> String {
    let escaped = ESCAPES
        .iter()
        .fold(s.to_owned(), |acc, (from, to)| acc.replace(*from, to));
    escape_non_printable(&escaped)
}

/// Apply [`json_safe`] to every string in a JSON value, object keys included.
/// Numbers, booleans and null pass through untouched.
pub fn json_safe_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(json_safe(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(json_safe_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (json_safe(&k), json_safe_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

fn is_printable_ascii(ch: char) -> bool {
    (' '..='~').contains(&ch)
}

fn escape_non_printable(s: &str) -> String {
    if s.chars().all(is_printable_ascii) {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len() + 16);
    let mut units = [0u16; 2];
    for ch in s.chars() {
        if is_printable_ascii(ch) {
            out.push(ch);
        } else {
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
