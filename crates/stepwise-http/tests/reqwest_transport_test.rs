//! RequestExecutor over the real reqwest transport, against wiremock servers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use stepwise_config::StepDescriptor;
use stepwise_http::{RequestExecutor, ReqwestTransport, RetryPolicy, fetch_error_message};
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn executor() -> RequestExecutor {
  RequestExecutor::new(Arc::new(ReqwestTransport::new()))
}

fn step(value: Value) -> StepDescriptor {
  serde_json::from_value(value).unwrap()
}

fn fast_policy(retries: u32) -> RetryPolicy {
  RetryPolicy {
    timeout_ms: 2_000,
    retries,
    backoff_ms: 5,
  }
}

#[tokio::test]
async fn test_get_json() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/users/1"))
    .and(header("accept", "application/json"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "name": "Ada" })))
    .expect(1)
    .mount(&server)
    .await;

  let result = executor()
    .execute(
      &step(json!({ "endpoint": server.uri(), "url_ext": "/users/1" })),
      fast_policy(1),
    )
    .await;

  assert_eq!(result, json!({ "id": 1, "name": "Ada" }));
}

#[tokio::test]
async fn test_get_plain_text() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/hello"))
    .respond_with(ResponseTemplate::new(200).set_body_string("Hello, World!"))
    .mount(&server)
    .await;

  let result = executor()
    .execute(
      &step(json!({ "endpoint": format!("{}/hello", server.uri()) })),
      fast_policy(0),
    )
    .await;

  assert_eq!(result, json!({ "_text": "Hello, World!" }));
}

#[tokio::test]
async fn test_post_object_body_as_json() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/posts"))
    .and(header("content-type", "application/json"))
    .and(body_json(json!({ "title": "Hi", "userId": 7 })))
    .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 101 })))
    .expect(1)
    .mount(&server)
    .await;

  let result = executor()
    .execute(
      &step(json!({
        "method": "post",
        "endpoint": server.uri(),
        "url_ext": "/posts",
        "body": { "title": "Hi", "userId": 7 }
      })),
      fast_policy(0),
    )
    .await;

  assert_eq!(result, json!({ "id": 101 }));
}

#[tokio::test]
async fn test_put_string_body_verbatim_with_custom_header() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/raw"))
    .and(header("x-api-key", "secret"))
    .and(body_string("name=Ada"))
    .respond_with(ResponseTemplate::new(204))
    .expect(1)
    .mount(&server)
    .await;

  let result = executor()
    .execute(
      &step(json!({
        "action": "PUT",
        "endpoint": server.uri(),
        "url_ext": "/raw",
        "headers": { "X-Api-Key": "secret" },
        "body": "name=Ada"
      })),
      fast_policy(0),
    )
    .await;

  assert_eq!(result, json!({ "_text": "" }));
}

#[tokio::test]
async fn test_not_found_with_json_body() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "missing" })))
    .expect(1)
    .mount(&server)
    .await;

  let result = executor()
    .execute(&step(json!({ "endpoint": server.uri() })), fast_policy(3))
    .await;

  assert_eq!(
    result,
    json!({ "_fetchError": "HTTP 404 Not Found", "_httpBody": { "error": "missing" } })
  );
}

#[tokio::test]
async fn test_server_error_with_text_body() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
    .mount(&server)
    .await;

  let result = executor()
    .execute(&step(json!({ "endpoint": server.uri() })), fast_policy(0))
    .await;

  assert_eq!(
    result,
    json!({ "_fetchError": "HTTP 500 Internal Server Error", "_httpText": "boom" })
  );
}

#[tokio::test]
async fn test_non_canonical_reason_phrase_is_kept() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
      let n = socket.read(&mut buf).await.unwrap();
      if n == 0 {
        break;
      }
      request.extend_from_slice(&buf[..n]);
    }
    socket
      .write_all(
        b"HTTP/1.1 418 Out Of Coffee\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbrew",
      )
      .await
      .unwrap();
    socket.shutdown().await.unwrap();
  });

  let result = executor()
    .execute(
      &step(json!({ "endpoint": format!("http://{}", addr) })),
      fast_policy(0),
    )
    .await;

  assert_eq!(
    result,
    json!({ "_fetchError": "HTTP 418 Out Of Coffee", "_httpText": "brew" })
  );
}

#[tokio::test]
async fn test_json_content_type_with_invalid_body() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "application/json"))
    .mount(&server)
    .await;

  let result = executor()
    .execute(&step(json!({ "endpoint": server.uri() })), fast_policy(0))
    .await;

  assert_eq!(result, json!({ "_text": "not json" }));
}

#[tokio::test]
async fn test_timeout_is_retried_then_reported() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
    .expect(2)
    .mount(&server)
    .await;

  let result = executor()
    .execute(
      &step(json!({ "endpoint": server.uri() })),
      RetryPolicy {
        timeout_ms: 50,
        retries: 1,
        backoff_ms: 5,
      },
    )
    .await;

  assert_eq!(
    fetch_error_message(&result),
    Some("request timed out after 50ms")
  );
}

#[tokio::test]
async fn test_connection_refused_is_reported() {
  // Bind a listener to grab a free port, then close it so nothing is listening.
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let result = executor()
    .execute(
      &step(json!({ "endpoint": format!("http://{}", addr) })),
      fast_policy(1),
    )
    .await;

  let message = fetch_error_message(&result).unwrap();
  assert!(message.starts_with("connection failed"), "{}", message);
  assert_eq!(result.as_object().unwrap().len(), 1);
}
