//! Template expression resolution.
//!
//! Config values may embed `{{path}}` tokens that refer to the run input or
//! to earlier node results (see [`ExecutionContext::lookup`]). Resolution
//! never fails: a token that cannot be resolved renders as an empty string
//! inside text, and is kept verbatim when it is the whole value.

use crate::context::ExecutionContext;
use serde_json::{Map, Value as JsonValue};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A `{{path}}` occurrence inside a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'s> {
    start: usize,
    end: usize,
    path: &'s str,
}

fn is_path(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-'))
        })
}

fn tokens(s: &str) -> Vec<Token<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = s[cursor..].find(OPEN) {
        let start = cursor + offset;
        let body = start + OPEN.len();
        let Some(close) = s[body..].find(CLOSE) else {
            break;
        };
        let path = s[body..body + close].trim();
        if is_path(path) {
            let end = body + close + CLOSE.len();
            found.push(Token { start, end, path });
            cursor = end;
        } else {
            cursor = body;
        }
    }
    found
}

/// Formats a value for insertion into text.
///
/// Strings are inserted without quotes and null as nothing; everything else
/// is its JSON form.
#[must_use]
pub fn display_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a template string, substituting every token.
#[must_use]
pub fn render(template: &str, context: &ExecutionContext) -> String {
    let found = tokens(template);
    if found.is_empty() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for token in found {
        out.push_str(&template[cursor..token.start]);
        if let Some(value) = context.lookup(token.path) {
            out.push_str(&display_value(value));
        }
        cursor = token.end;
    }
    out.push_str(&template[cursor..]);
    out
}

/// Resolves a config value against the context.
///
/// A string that is exactly one token becomes the referenced value with its
/// type preserved. Other strings are rendered. Objects and arrays are
/// resolved element by element.
#[must_use]
pub fn resolve_value(value: &JsonValue, context: &ExecutionContext) -> JsonValue {
    match value {
        JsonValue::String(s) => resolve_string(s, context),
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve_value(item, context))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(resolve_map(map, context)),
        other => other.clone(),
    }
}

/// Resolves every value of an object.
#[must_use]
pub fn resolve_map(map: &Map<String, JsonValue>, context: &ExecutionContext) -> Map<String, JsonValue> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, context)))
        .collect()
}

fn resolve_string(s: &str, context: &ExecutionContext) -> JsonValue {
    let found = tokens(s);
    match found.as_slice() {
        [] => JsonValue::String(s.to_string()),
        [only] if only.start == 0 && only.end == s.len() => context
            .lookup(only.path)
            .cloned()
            .unwrap_or_else(|| JsonValue::String(s.to_string())),
        _ => JsonValue::String(render(s, context)),
    }
}
