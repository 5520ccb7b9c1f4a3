//! Request executor implementation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use stepwise_config::StepDescriptor;
use stepwise_template::display_string;
use tracing::{debug, info, instrument, warn};

use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Key carrying a failure message in a recorded step result.
pub const FETCH_ERROR_KEY: &str = "_fetchError";
/// Parsed JSON body of a non-2xx response.
pub const HTTP_BODY_KEY: &str = "_httpBody";
/// Raw body of a non-2xx response that is not (valid) JSON.
pub const HTTP_TEXT_KEY: &str = "_httpText";
/// Raw body of a 2xx response that is not (valid) JSON.
pub const TEXT_KEY: &str = "_text";

const NO_ENDPOINT: &str = "No endpoint provided";

/// Timeout and retry settings for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Bound on a single attempt.
  pub timeout_ms: u64,
  /// Additional attempts after the first one.
  pub retries: u32,
  /// Wait before the first retry; doubled after every retry.
  pub backoff_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      timeout_ms: 10_000,
      retries: 1,
      backoff_ms: 300,
    }
  }
}

impl RetryPolicy {
  /// Waits between consecutive attempts, in order.
  pub fn backoff_schedule(&self) -> impl Iterator<Item = Duration> + use<> {
    let base = self.backoff_ms;
    (0..self.retries).map(move |i| {
      let factor = 1u64.checked_shl(i).unwrap_or(u64::MAX);
      Duration::from_millis(base.saturating_mul(factor))
    })
  }
}

/// Executes templated steps against a [`Transport`].
#[derive(Clone)]
pub struct RequestExecutor {
  transport: Arc<dyn Transport>,
}

impl RequestExecutor {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self { transport }
  }

  /// Perform the step's HTTP call and return its recorded value.
  ///
  /// Never fails: transport errors are retried per `policy` and then
  /// reported as `{ "_fetchError": ... }`, like every other outcome.
  #[instrument(
    name = "request_execute",
    skip(self, step, policy),
    fields(
      step_id = %step.step_id(),
      retries = policy.retries,
    )
  )]
  pub async fn execute(&self, step: &StepDescriptor, policy: RetryPolicy) -> Value {
    let Some(request) = build_request(step, Duration::from_millis(policy.timeout_ms)) else {
      warn!("request_skipped: no endpoint");
      return fetch_error(NO_ENDPOINT);
    };

    info!(method = %request.method, url = %request.url, "request_started");

    let mut delays = policy.backoff_schedule();
    let mut attempt: u32 = 0;

    loop {
      attempt += 1;
      debug!(attempt, "request_attempt");

      match self.transport.send(&request).await {
        Ok(response) => {
          info!(attempt, status = response.status, "request_completed");
          return interpret_response(response);
        }
        Err(e) => match delays.next() {
          Some(delay) => {
            warn!(
              attempt,
              backoff_ms = delay.as_millis() as u64,
              error = %e,
              "request_retrying"
            );
            tokio::time::sleep(delay).await;
          }
          None => {
            warn!(attempt, error = %e, "request_failed");
            return fetch_error(&e.to_string());
          }
        },
      }
    }
  }
}

/// Build the outbound request for a templated step.
///
/// Returns `None` when `endpoint + url_ext` is empty.
pub fn build_request(step: &StepDescriptor, timeout: Duration) -> Option<HttpRequest> {
  let url = step.url();
  if url.is_empty() {
    return None;
  }

  let method = step.http_method();
  let mut headers = vec![("Accept".to_string(), "application/json".to_string())];

  let body = if matches!(method.as_str(), "POST" | "PUT" | "PATCH") {
    match &step.body {
      Some(Value::Object(map)) => {
        set_header(&mut headers, "Content-Type", "application/json".to_string());
        Some(Value::Object(map.clone()).to_string())
      }
      Some(Value::String(text)) => Some(text.clone()),
      Some(Value::Null) | None => None,
      Some(other) => Some(other.to_string()),
    }
  } else {
    None
  };

  if let Some(extra) = &step.headers {
    for (name, value) in extra {
      set_header(&mut headers, name, display_string(value));
    }
  }

  Some(HttpRequest {
    method,
    url,
    headers,
    body,
    timeout,
  })
}

/// Replace a header (ignoring name case) in place, or append it.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
  match headers
    .iter_mut()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
  {
    Some(existing) => *existing = (name.to_string(), value),
    None => headers.push((name.to_string(), value)),
  }
}

fn interpret_response(response: HttpResponse) -> Value {
  if !response.is_success() {
    let message = format!("HTTP {} {}", response.status, response.reason)
      .trim_end()
      .to_string();

    if response.is_json() {
      if let Ok(body) = response.json() {
        return json!({ FETCH_ERROR_KEY: message, HTTP_BODY_KEY: body });
      }
    }
    return json!({ FETCH_ERROR_KEY: message, HTTP_TEXT_KEY: response.body });
  }

  if response.is_json() {
    if let Ok(body) = response.json() {
      return body;
    }
    debug!("response_decode_failed: falling back to raw text");
  }

  json!({ TEXT_KEY: response.body })
}

fn fetch_error(message: &str) -> Value {
  let mut map = Map::new();
  map.insert(FETCH_ERROR_KEY.to_string(), Value::String(message.to_string()));
  Value::Object(map)
}

/// The `_fetchError` message of a recorded result, if it has one.
pub fn fetch_error_message(value: &Value) -> Option<&str> {
  value.get(FETCH_ERROR_KEY).and_then(Value::as_str)
}
