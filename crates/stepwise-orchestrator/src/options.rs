//! Run and engine configuration.

use serde::{Deserialize, Serialize};
use stepwise_config::StepDescriptor;
use stepwise_http::RetryPolicy;

/// Per-run settings.
///
/// Deserializes from camelCase JSON with every field optional:
///
/// ```json
/// { "fetch": true, "timeoutMs": 2000, "retries": 3, "backoffMs": 100 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
  /// Perform live HTTP calls. When false, a step's templated `body` is its
  /// result.
  pub fetch: bool,
  /// Per-attempt timeout for steps without their own `timeoutMs`.
  pub timeout_ms: u64,
  /// Retries for steps without their own `retries`.
  pub retries: u32,
  /// Wait before the first retry, doubled after each one.
  pub backoff_ms: u64,
}

impl Default for RunOptions {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      fetch: false,
      timeout_ms: policy.timeout_ms,
      retries: policy.retries,
      backoff_ms: policy.backoff_ms,
    }
  }
}

impl RunOptions {
  /// The effective retry policy for a step: its own overrides, else the run's.
  pub fn retry_policy_for(&self, step: &StepDescriptor) -> RetryPolicy {
    RetryPolicy {
      timeout_ms: step.timeout_ms.unwrap_or(self.timeout_ms),
      retries: step.retries.unwrap_or(self.retries),
      backoff_ms: self.backoff_ms,
    }
  }
}

/// Configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
  /// User agent sent with every request. Uses reqwest's default when unset.
  pub user_agent: Option<String>,
}
