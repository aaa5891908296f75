use super::{FetchRequest, FetchResponse, ResponseHeaders, ResponseKind, Transport};
use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use tracing::debug;
use url::Origin;

/// Network transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  /// Application origin; responses from it are `Basic`, the rest `Cors`
  origin: Origin,
}

impl HttpTransport {
  pub fn new(origin: Origin) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("grocer/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    let FetchRequest {
      method,
      url,
      headers,
      body,
    } = request;

    let mut builder = self.client.request(method.clone(), url.clone());
    for (name, value) in &headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
      builder = builder.body(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("{} {} failed: {}", method, url, e))?;

    let status = response.status().as_u16();
    let final_url = response.url().clone();
    let kind = if final_url.origin() == self.origin {
      ResponseKind::Basic
    } else {
      ResponseKind::Cors
    };
    let headers: ResponseHeaders = response
      .headers()
      .iter()
      .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response body from {}: {}", final_url, e))?
      .to_vec();

    debug!(%method, %url, status, %kind, bytes = body.len(), "network fetch");

    Ok(FetchResponse {
      status,
      kind,
      url: final_url,
      headers,
      body,
    })
  }
}
