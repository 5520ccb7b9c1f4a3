//! Stepwise HTTP
//!
//! Executes a single templated step as an HTTP call. The [`RequestExecutor`]
//! owns the retry/backoff loop and turns every outcome into data: callers
//! always get a `serde_json::Value` back, never an error.
//!
//! | outcome                         | recorded value                                   |
//! |---------------------------------|--------------------------------------------------|
//! | 2xx, JSON body                  | the parsed body                                  |
//! | 2xx, other or unparseable body  | `{ "_text": <raw> }`                             |
//! | non-2xx, JSON body              | `{ "_fetchError": "HTTP 404 Not Found", "_httpBody": <parsed> }` |
//! | non-2xx, other body             | `{ "_fetchError": "HTTP 500 ...", "_httpText": <raw> }` |
//! | transport failure, retries spent| `{ "_fetchError": <message> }`                   |
//!
//! The network itself sits behind the [`Transport`] trait so the executor can
//! be driven by [`ReqwestTransport`] in production and by scripted transports
//! in tests.

mod error;
mod executor;
mod transport;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod test_fixtures;

pub use error::TransportError;
pub use executor::{
  FETCH_ERROR_KEY, HTTP_BODY_KEY, HTTP_TEXT_KEY, RequestExecutor, RetryPolicy, TEXT_KEY,
  build_request, fetch_error_message,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
