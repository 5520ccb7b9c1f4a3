use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Post-processing rule applied to a step's raw result before it is recorded.
///
/// Unrecognized policy names are kept as [`CollectPolicy::Other`] so the step
/// round-trips unchanged; they leave the result untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CollectPolicy {
  /// Replace an array result with its first element (or null when empty).
  First,
  /// Keep the array as-is.
  Array,
  Other(String),
}

impl CollectPolicy {
  /// Apply the policy to a raw step result.
  pub fn apply(&self, value: Value) -> Value {
    match (self, value) {
      (CollectPolicy::First, Value::Array(items)) => {
        items.into_iter().next().unwrap_or(Value::Null)
      }
      (_, value) => value,
    }
  }
}

impl From<String> for CollectPolicy {
  fn from(name: String) -> Self {
    match name.as_str() {
      "first" => CollectPolicy::First,
      "array" => CollectPolicy::Array,
      _ => CollectPolicy::Other(name),
    }
  }
}

impl From<CollectPolicy> for String {
  fn from(policy: CollectPolicy) -> Self {
    match policy {
      CollectPolicy::First => "first".to_string(),
      CollectPolicy::Array => "array".to_string(),
      CollectPolicy::Other(name) => name,
    }
  }
}
