//! Error types for a run.

use stepwise_config::ConfigError;
use stepwise_http::TransportError;
use thiserror::Error;

/// Errors that stop a run.
///
/// Step failures are never reported here; they are recorded as data in the
/// step's result.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The step list was rejected before anything executed.
  #[error("invalid step list: {0}")]
  Validation(#[from] ConfigError),

  /// The HTTP client could not be constructed.
  #[error("failed to set up http transport: {0}")]
  Transport(#[source] TransportError),

  /// The run was cancelled.
  #[error("run cancelled")]
  Cancelled,
}
