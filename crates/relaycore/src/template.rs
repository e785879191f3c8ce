//! `{{ path.to.value }}` placeholder rendering against a run context.

use crate::context::{display_value, lookup_path};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid regex"))
}

/// Whether `text` contains at least one placeholder.
pub fn is_template(text: &str) -> bool {
    placeholder_regex().is_match(text)
}

/// Substitute every placeholder in `template`. Unresolvable paths render as
/// an empty string.
pub fn render(template: &str, context: &Map<String, Value>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            lookup_path(context, &caps[1])
                .map(display_value)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Render string values; every other JSON value passes through unchanged.
pub fn render_value(value: &Value, context: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, context)),
        other => other.clone(),
    }
}
