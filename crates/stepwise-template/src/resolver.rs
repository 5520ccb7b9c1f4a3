//! Placeholder resolution against an [`ExecutionContext`].

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::context::ExecutionContext;

/// `{{ steps.<id> }}` or `{{ steps.<id>.<dotted.path> }}`.
static STEP_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\{\{\s*steps\.([A-Za-z0-9_\-]+)(?:\.([^}]+?))?\s*\}\}")
    .expect("step reference pattern is valid")
});

/// Resolve every placeholder in a string.
///
/// Returns `Cow::Borrowed` when the string contains no placeholder.
pub fn resolve_str<'a>(template: &'a str, context: &ExecutionContext) -> Cow<'a, str> {
  if !template.contains("{{") {
    return Cow::Borrowed(template);
  }

  STEP_REF_RE.replace_all(template, |caps: &Captures| {
    let step_id = &caps[1];
    let path = caps.get(2).map(|m| m.as_str().trim());
    context
      .lookup(step_id, path)
      .map(display_string)
      .unwrap_or_default()
  })
}

/// Resolve placeholders anywhere inside a JSON value.
///
/// Strings are resolved, arrays and objects are walked recursively, and other
/// scalars are returned as-is. The input is never modified.
pub fn resolve_value(value: &Value, context: &ExecutionContext) -> Value {
  match value {
    Value::String(s) => Value::String(resolve_str(s, context).into_owned()),
    Value::Array(items) => Value::Array(
      items
        .iter()
        .map(|item| resolve_value(item, context))
        .collect(),
    ),
    Value::Object(map) => Value::Object(
      map
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, context)))
        .collect(),
    ),
    other => other.clone(),
  }
}

/// The text a value takes when substituted into a string.
///
/// Strings are used verbatim, `null` becomes empty, everything else is
/// rendered as compact JSON.
pub fn display_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Step ids referenced by placeholders anywhere inside a value, in order of
/// first appearance.
pub fn step_references(value: &Value) -> Vec<String> {
  let mut refs = Vec::new();
  collect_references(value, &mut refs);
  refs
}

fn collect_references(value: &Value, refs: &mut Vec<String>) {
  match value {
    Value::String(s) => {
      for caps in STEP_REF_RE.captures_iter(s) {
        let id = &caps[1];
        if !refs.iter().any(|r| r == id) {
          refs.push(id.to_string());
        }
      }
    }
    Value::Array(items) => items.iter().for_each(|v| collect_references(v, refs)),
    Value::Object(map) => map.values().for_each(|v| collect_references(v, refs)),
    _ => {}
  }
}
