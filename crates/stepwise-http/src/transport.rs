//! The network seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::TransportError;

/// A fully built outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  /// Upper-cased HTTP verb.
  pub method: String,
  pub url: String,
  /// Headers in send order. Names are unique ignoring case.
  pub headers: Vec<(String, String)>,
  pub body: Option<String>,
  /// Bound on a single attempt.
  pub timeout: Duration,
}

impl HttpRequest {
  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }
}

/// A response as seen by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  /// Reason phrase, e.g. "Not Found". Empty when the status has none.
  pub reason: String,
  pub headers: Vec<(String, String)>,
  pub body: String,
}

impl HttpResponse {
  /// Whether the status is in the 2xx range.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  pub fn content_type(&self) -> Option<&str> {
    self.header("content-type")
  }

  /// Whether the content type announces a JSON body.
  pub fn is_json(&self) -> bool {
    self
      .content_type()
      .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
  }

  /// Parse the body as JSON.
  pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(&self.body)
  }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}

/// Performs one HTTP exchange.
///
/// Implementations report transport-level failures (connect, timeout, body
/// read) as [`TransportError`]. Any HTTP status, including 4xx and 5xx, is a
/// successful exchange and comes back as an [`HttpResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use a preconfigured client (proxies, TLS roots, user agent...).
  pub fn with_client(client: Client) -> Self {
    Self { client }
  }

  /// Build a client that identifies itself with the given user agent.
  pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
    let client = Client::builder()
      .user_agent(user_agent)
      .build()
      .map_err(|e| TransportError::InvalidRequest {
        message: format!("failed to build http client: {}", e),
      })?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX);

    let method =
      Method::from_bytes(request.method.as_bytes()).map_err(|_| TransportError::InvalidRequest {
        message: format!("unsupported HTTP method: {}", request.method),
      })?;

    let mut builder = self
      .client
      .request(method, &request.url)
      .timeout(request.timeout);

    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }

    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| TransportError::from_reqwest(e, timeout_ms))?;

    let status = response.status();
    let reason = reason_phrase(&response);
    let headers = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), val.to_string()))
      })
      .collect();

    let body = response
      .text()
      .await
      .map_err(|e| TransportError::from_reqwest(e, timeout_ms))?;

    Ok(HttpResponse {
      status: status.as_u16(),
      reason,
      headers,
      body,
    })
  }
}

/// The phrase from the status line. hyper only keeps it when it differs
/// from the canonical one, so fall back to that.
fn reason_phrase(response: &reqwest::Response) -> String {
  response
    .extensions()
    .get::<hyper::ext::ReasonPhrase>()
    .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
    .or_else(|| response.status().canonical_reason())
    .unwrap_or_default()
    .to_string()
}
