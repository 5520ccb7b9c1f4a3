//! Transport error types.

/// A failure below the HTTP status layer.
///
/// Every variant is retried by the [`RequestExecutor`](crate::RequestExecutor);
/// once attempts run out the error's message becomes the step's
/// `_fetchError` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
  /// The attempt did not complete within its timeout.
  #[error("request timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// Connecting to or talking with the remote host failed.
  #[error("connection failed: {message}")]
  Connection { message: String },

  /// The request could not be built (bad URL, method or header).
  #[error("invalid request: {message}")]
  InvalidRequest { message: String },

  /// The response arrived but its body could not be read.
  #[error("failed to read response body: {message}")]
  Body { message: String },
}

impl TransportError {
  pub(crate) fn from_reqwest(error: reqwest::Error, timeout_ms: u64) -> Self {
    if error.is_timeout() {
      TransportError::Timeout { timeout_ms }
    } else if error.is_builder() {
      TransportError::InvalidRequest {
        message: error.to_string(),
      }
    } else if error.is_body() || error.is_decode() {
      TransportError::Body {
        message: error.to_string(),
      }
    } else {
      TransportError::Connection {
        message: error.to_string(),
      }
    }
  }
}
