//! `${dotted.path}` resolution against a context store.
//!
//! Resolution is pure: it reads the context and builds a new value. A
//! reference whose path is missing (or `null`) is left in the output as its
//! literal `${...}` text, so broken references surface visibly instead of
//! turning into empty strings or failing the run.
//!
//! - A string that is exactly one marker resolves to the referenced value
//!   with its JSON type intact (`"${lead.id}"` -> `42`).
//! - Any other string has each resolvable marker replaced by the value's
//!   string form.
//! - Arrays and objects are resolved element-wise; object keys are never
//!   rewritten.
//! - Numbers, booleans and `null` pass through unchanged.

use serde_json::Value;

use super::context::ContextStore;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Resolve every reference inside `value`.
pub fn resolve(value: &Value, ctx: &ContextStore) -> Value {
    match value {
        Value::String(s) => resolve_str(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Render a text template: every resolvable marker is replaced by its
/// string form, unresolvable ones are kept literally.
pub fn render_template(template: &str, ctx: &ContextStore) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];

        let Some(end) = after.find(CLOSE) else {
            // Unterminated marker: keep the remainder as-is.
            out.push_str(&rest[start..]);
            return out;
        };

        let path = after[..end].trim();
        match ctx.lookup(path) {
            Some(value) => out.push_str(&value_to_string(value)),
            None => out.push_str(&rest[start..start + OPEN.len() + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_str(s: &str, ctx: &ContextStore) -> Value {
    if let Some(path) = sole_marker(s) {
        return match ctx.lookup(path) {
            Some(value) => value.clone(),
            None => Value::String(s.to_string()),
        };
    }
    Value::String(render_template(s, ctx))
}

/// If `s` is exactly one `${path}` marker, return the trimmed path.
fn sole_marker(s: &str) -> Option<&str> {
    let inner = s.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(CLOSE) || inner.contains(OPEN) {
        return None;
    }
    Some(inner.trim())
}

/// Convert a JSON value to its display string for interpolation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // For objects/arrays, return compact JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
