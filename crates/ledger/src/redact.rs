//! Metadata redaction for persisted request/response bodies.

use serde_json::Value as JsonValue;

/// Replacement for values under sensitive keys.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Replacement for structures nested beyond the walk bound.
pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";

/// Case-insensitive substrings that mark a key as sensitive.
const DENYLIST: &[&str] = &[
    "password",
    "secret",
    "token",
    "key",
    "authorization",
    "credential",
    "assertion",
    "signature",
];

/// Maximum object/array nesting the walk descends into.
const MAX_DEPTH: usize = 10;

/// Whether a key name matches the denylist.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    DENYLIST.iter().any(|d| key.contains(d))
}

/// Recursively redact sensitive values in a JSON structure.
///
/// Any value whose key matches the denylist is replaced with
/// [`REDACTION_MARKER`]. Structures deeper than the bound are collapsed to
/// [`TRUNCATION_MARKER`] rather than walked, so nothing below the bound can
/// leak.
pub fn redact(value: &JsonValue) -> JsonValue {
    redact_at(value, 0)
}

fn redact_at(value: &JsonValue, depth: usize) -> JsonValue {
    match value {
        JsonValue::Object(map) => {
            if depth >= MAX_DEPTH {
                return JsonValue::String(TRUNCATION_MARKER.to_string());
            }
            let mut out = serde_json::Map::new();
            for (key, inner) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), JsonValue::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), redact_at(inner, depth + 1));
                }
            }
            JsonValue::Object(out)
        }
        JsonValue::Array(items) => {
            if depth >= MAX_DEPTH {
                return JsonValue::String(TRUNCATION_MARKER.to_string());
            }
            JsonValue::Array(items.iter().map(|v| redact_at(v, depth + 1)).collect())
        }
        scalar => scalar.clone(),
    }
}
