use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

use crate::collect::CollectPolicy;

/// A declarative HTTP step.
///
/// Every field is optional on the wire. After [`normalize_steps`] has run,
/// `id` is always `Some` and unique within the step list.
///
/// Fields the engine does not know about are kept in `extra` and serialized
/// back unchanged, so a step echoed in the results looks like its input.
///
/// [`normalize_steps`]: crate::normalize_steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
  /// Stable reference key used by templates (`{{ steps.<id>.path }}`).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,

  /// Mapping key the step came from when the input was an object.
  #[serde(rename = "_key", skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,

  /// Execution phase bucket. Steps without one share the default group.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,

  /// Alias for `method`, consulted when `method` is absent.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub action: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub endpoint: Option<String>,

  /// Appended to `endpoint` to form the request URL. Templated.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url_ext: Option<String>,

  /// Extra request headers. Values are templated.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub headers: Option<Map<String, Value>>,

  /// Request payload, or the literal result when running without fetch.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub collect: Option<CollectPolicy>,

  /// Output key -> dot-path into the step's result.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extract: Option<IndexMap<String, String>>,

  /// Dot-path placing the result in the output forest.
  #[serde(rename = "outputAs", skip_serializing_if = "Option::is_none")]
  pub output_as: Option<String>,

  #[serde(
    rename = "timeoutMs",
    default,
    deserialize_with = "whole_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub timeout_ms: Option<u64>,

  #[serde(
    default,
    deserialize_with = "whole_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub retries: Option<u32>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl StepDescriptor {
  /// The step's resolved id, or an empty string before normalization.
  pub fn step_id(&self) -> &str {
    self.id.as_deref().unwrap_or_default()
  }

  /// The upper-cased HTTP verb: `method`, else `action`, else `GET`.
  pub fn http_method(&self) -> String {
    [&self.method, &self.action]
      .into_iter()
      .flatten()
      .find(|m| !m.is_empty())
      .map(|m| m.to_uppercase())
      .unwrap_or_else(|| "GET".to_string())
  }

  /// The request URL: `endpoint` followed by `url_ext`.
  pub fn url(&self) -> String {
    let endpoint = self.endpoint.as_deref().unwrap_or_default();
    let url_ext = self.url_ext.as_deref().unwrap_or_default();
    format!("{}{}", endpoint, url_ext)
  }

  /// The `outputAs` path, treating an empty string as absent.
  pub fn output_path(&self) -> Option<&str> {
    self.output_as.as_deref().filter(|p| !p.is_empty())
  }
}

/// Reads a count that may arrive as `5000` or `5000.0`. Fractions, negative
/// numbers and values too large for `T` are rejected.
fn whole_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: TryFrom<u64>,
{
  let Some(value) = Option::<Value>::deserialize(deserializer)? else {
    return Ok(None);
  };
  let whole = match &value {
    Value::Number(n) => n.as_u64().or_else(|| {
      n.as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
        .map(|f| f as u64)
    }),
    _ => None,
  };
  whole
    .and_then(|n| T::try_from(n).ok())
    .map(Some)
    .ok_or_else(|| de::Error::custom(format!("expected a non-negative whole number, found {}", value)))
}
