use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::types::ApiErrorBody;
use crate::net::{FetchRequest, Headers, Transport};

/// Base used when no override is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

const GENERIC_ERROR: &str = "Network response was not ok";

/// Resolve the API base from an optional service root override.
pub fn resolve_base_url(override_url: Option<&str>) -> String {
  match override_url.map(str::trim).filter(|u| !u.is_empty()) {
    Some(root) => format!("{}/api", root.trim_end_matches('/')),
    None => DEFAULT_API_BASE.to_string(),
  }
}

/// Per-request overrides
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub headers: Headers,
  pub body: Option<Vec<u8>>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::GET,
      headers: Headers::new(),
      body: None,
    }
  }
}

impl RequestOptions {
  pub fn post() -> Self {
    Self {
      method: Method::POST,
      ..Self::default()
    }
  }

  #[cfg(test)]
  pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
    let bytes =
      serde_json::to_vec(body).map_err(|e| eyre!("Failed to serialize request body: {}", e))?;
    self.body = Some(bytes);
    Ok(self)
  }
}

/// Thin JSON client over a [`Transport`].
#[derive(Clone)]
pub struct ApiClient {
  base_url: String,
  transport: Arc<dyn Transport>,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
    Self {
      base_url: base_url.into(),
      transport,
    }
  }

  /// Join the base with a caller path, adding the slash between if missing
  pub fn build_url(&self, path: &str) -> Result<Url> {
    let joined = if path.starts_with('/') {
      format!("{}{}", self.base_url, path)
    } else {
      format!("{}/{}", self.base_url, path)
    };
    Url::parse(&joined).map_err(|e| eyre!("Invalid API URL '{}': {}", joined, e))
  }

  /// Send a JSON request and parse the JSON reply.
  ///
  /// A non-2xx status becomes an error carrying the server's `detail`
  /// message when it sent one.
  pub async fn request<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
    let url = self.build_url(path)?;

    let mut headers = Headers::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    headers.extend(options.headers);

    let request = FetchRequest {
      method: options.method,
      url,
      headers,
      body: options.body,
    };
    debug!(method = %request.method, url = %request.url, "api request");

    let response = self.transport.fetch(request).await?;

    if !response.ok() {
      let message = error_message(&response.body);
      warn!(path, status = response.status, %message, "api request failed");
      return Err(eyre!(message));
    }

    serde_json::from_slice(&response.body)
      .map_err(|e| eyre!("Failed to parse response from {}: {}", path, e))
  }
}

fn error_message(body: &[u8]) -> String {
  serde_json::from_slice::<ApiErrorBody>(body)
    .ok()
    .and_then(ApiErrorBody::into_message)
    .unwrap_or_else(|| GENERIC_ERROR.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::HttpTransport;
  use serde_json::{json, Value};
  use wiremock::matchers::{body_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> ApiClient {
    let base = resolve_base_url(Some(&server.uri()));
    let origin = Url::parse(&base).unwrap().origin();
    ApiClient::new(base, Arc::new(HttpTransport::new(origin).unwrap()))
  }

  #[test]
  fn test_resolve_base_url() {
    assert_eq!(resolve_base_url(None), DEFAULT_API_BASE);
    assert_eq!(resolve_base_url(Some("  ")), DEFAULT_API_BASE);
    assert_eq!(
      resolve_base_url(Some("https://grocer.example.com")),
      "https://grocer.example.com/api"
    );
    assert_eq!(
      resolve_base_url(Some("https://grocer.example.com/")),
      "https://grocer.example.com/api"
    );
  }

  #[test]
  fn test_build_url_adds_missing_slash() {
    let transport = Arc::new(crate::net::testing::MockTransport::new());
    let client = ApiClient::new(DEFAULT_API_BASE, transport);

    assert_eq!(
      client.build_url("message").unwrap().as_str(),
      "http://localhost:8000/api/message"
    );
    assert_eq!(
      client.build_url("/message").unwrap().as_str(),
      "http://localhost:8000/api/message"
    );
    assert_eq!(
      client.build_url("item/update?aisle=Dairy").unwrap().as_str(),
      "http://localhost:8000/api/item/update?aisle=Dairy"
    );
  }

  #[tokio::test]
  async fn test_request_sends_json_and_parses_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/echo"))
      .and(header("content-type", "application/json"))
      .and(body_json(json!({"hello": "world"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let reply: Value = client
      .request(
        "echo",
        RequestOptions::post().json(&json!({"hello": "world"})).unwrap(),
      )
      .await
      .unwrap();

    assert_eq!(reply, json!({"ok": true}));
  }

  #[tokio::test]
  async fn test_caller_headers_override_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/raw"))
      .and(header("content-type", "text/plain"))
      .and(header("x-request-id", "abc"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;

    let client = client_for(&server);
    let reply: Value = client
      .request(
        "/raw",
        RequestOptions::default()
          .header("Content-Type", "text/plain")
          .header("X-Request-Id", "abc"),
      )
      .await
      .unwrap();

    assert_eq!(reply, json!([]));
  }

  #[tokio::test]
  async fn test_error_status_uses_detail_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/item/remove"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Item not found"})))
      .mount(&server)
      .await;

    let client = client_for(&server);
    let err = client
      .request::<Value>("item/remove", RequestOptions::post())
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "Item not found");
  }

  #[tokio::test]
  async fn test_error_status_without_json_body_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/message"))
      .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
      .mount(&server)
      .await;

    let client = client_for(&server);
    let err = client
      .request::<Value>("message", RequestOptions::post())
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), GENERIC_ERROR);
  }

  #[tokio::test]
  async fn test_unreachable_server_is_an_error() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let result = client
      .request::<Value>("message", RequestOptions::post())
      .await;
    assert!(result.is_err());
  }
}
