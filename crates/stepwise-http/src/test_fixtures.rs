//! Scripted transports for exercising the executor without a network.
//!
//! Compiled for this crate's own tests and, behind the `test-fixtures`
//! feature, for integration tests in dependent crates.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Replays scripted outcomes in order and records each request with the
/// (tokio) time it arrived. Once the script runs out every call fails to
/// connect.
pub struct ScriptedTransport {
  script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
  calls: Mutex<Vec<(HttpRequest, Instant)>>,
}

impl ScriptedTransport {
  pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
    Arc::new(Self {
      script: Mutex::new(script.into()),
      calls: Mutex::new(Vec::new()),
    })
  }

  /// Every request seen so far, oldest first.
  pub fn calls(&self) -> Vec<(HttpRequest, Instant)> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    self
      .calls
      .lock()
      .unwrap()
      .push((request.clone(), Instant::now()));
    self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
      Err(TransportError::Connection {
        message: "connection refused".to_string(),
      })
    })
  }
}

/// A 200 response carrying `body` as JSON.
pub fn json_response(body: serde_json::Value) -> Result<HttpResponse, TransportError> {
  Ok(HttpResponse {
    status: 200,
    reason: "OK".to_string(),
    headers: vec![("content-type".to_string(), "application/json".to_string())],
    body: body.to_string(),
  })
}
