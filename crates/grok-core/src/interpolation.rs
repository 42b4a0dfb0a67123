//! Strict `{name}` placeholder interpolation.
//!
//! Only identifiers matching `[a-zA-Z_][a-zA-Z0-9_]*` inside single braces
//! are placeholders. Anything else (JSON examples, `{ }`, `{1}`) is left as
//! literal text. A placeholder without a value is an error; nothing is ever
//! silently left unresolved.

use std::collections::HashMap;

use regex::{Captures, Regex};
use serde_json::Value;

lazy_static::lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}")
        .unwrap_or_else(|_| unreachable!("placeholder pattern is valid"));
}

/// Placeholder names in `template`, in first-appearance order, deduplicated.
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Replace every placeholder in `template` with its value.
///
/// Values are inserted verbatim and never re-scanned for placeholders.
/// Returns the first placeholder with no entry in `variables` as the error.
pub fn interpolate(template: &str, variables: &HashMap<String, String>) -> Result<String, String> {
    if let Some(missing) = extract_variables(template)
        .into_iter()
        .find(|name| !variables.contains_key(name))
    {
        return Err(missing);
    }

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        variables.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Text form of a variable value: strings as-is, `null` as empty, everything
/// else as pretty-printed JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}
