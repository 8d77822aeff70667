//! Canonical JSON serialization.
//!
//! Objects are emitted with keys in lexicographic byte order at every
//! nesting level, arrays keep their order, and scalars use standard JSON
//! text. The output carries no whitespace. This form is stable across
//! implementations, which is what makes content hashes and signatures
//! portable between nodes.
//!
//! Key ordering is applied explicitly rather than relying on map iteration
//! order, so the result does not depend on how `serde_json` was configured
//! by a downstream build.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use crate::error::CryptoError;

/// Render a JSON value in canonical form.
pub fn to_canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Serialize any value through `serde_json::Value` and render it
/// canonically.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let json = serde_json::to_value(value)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(to_canonical_json(&json))
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by_key(|(key, _)| key.as_str());
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// JSON string escaping matching `serde_json` and `JSON.stringify`: the
/// two-character escapes for the usual control characters, `\u00XX` for the
/// rest of the C0 range, everything else verbatim.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
