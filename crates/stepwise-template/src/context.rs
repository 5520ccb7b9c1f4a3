//! Execution context.
//!
//! The context is owned by a single scheduler invocation and passed by
//! reference to template resolution. It is never shared across runs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::path::lookup_path;

/// Recorded step results, keyed by step id in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionContext {
  steps: IndexMap<String, Value>,
}

impl ExecutionContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the recorded result for a step.
  pub fn get(&self, step_id: &str) -> Option<&Value> {
    self.steps.get(step_id)
  }

  pub fn contains(&self, step_id: &str) -> bool {
    self.steps.contains_key(step_id)
  }

  /// Look up a value inside a step's result.
  ///
  /// With no path, the whole result is returned.
  pub fn lookup(&self, step_id: &str, path: Option<&str>) -> Option<&Value> {
    let result = self.get(step_id)?;
    match path {
      Some(path) => lookup_path(result, path),
      None => Some(result),
    }
  }

  /// Record a step's result, replacing any previous entry for the id.
  pub fn record(&mut self, step_id: impl Into<String>, value: Value) {
    self.steps.insert(step_id.into(), value);
  }

  /// Merge extracted fields into a step's entry.
  ///
  /// An entry that is not an object (or is missing) is replaced by an empty
  /// object first, so the fields always land in a mapping.
  pub fn merge_extracted<I>(&mut self, step_id: &str, fields: I)
  where
    I: IntoIterator<Item = (String, Value)>,
  {
    let entry = self
      .steps
      .entry(step_id.to_string())
      .or_insert(Value::Null);
    if !entry.is_object() {
      *entry = Value::Object(Map::new());
    }
    if let Value::Object(map) = entry {
      map.extend(fields);
    }
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.steps.iter()
  }
}
