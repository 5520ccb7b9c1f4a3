use thiserror::Error;

/// Errors raised while validating a step list.
///
/// These are the only errors that stop an engine invocation: once a step list
/// has been normalized, every later failure is reported as data.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The top-level input is neither an array nor an object.
  #[error("input must be an array or an object of steps, found {found}")]
  InvalidShape { found: &'static str },

  /// A step is not an object, or one of its fields has the wrong type.
  #[error("invalid step at position {index}: {message}")]
  InvalidStep { index: usize, message: String },
}
