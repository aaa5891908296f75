//! Request/response model shared by the API client and the offline cache.
//!
//! Everything that leaves the process goes through a [`Transport`]. The plain
//! [`HttpTransport`] talks to the network; the offline cache registration wraps
//! it and decides per request whether the network is consulted at all.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// Request header map with lowercased names.
pub type Headers = BTreeMap<String, String>;

/// Response headers as received: arrival order, repeated names kept and raw
/// value bytes.
pub type ResponseHeaders = Vec<(String, Vec<u8>)>;

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Headers,
  pub body: Option<Vec<u8>>,
}

impl FetchRequest {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      headers: Headers::new(),
      body: None,
    }
  }

  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  /// Set a header, replacing any value under the same (case-insensitive) name
  #[cfg(test)]
  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  /// Key under which a response to this request is cached: the URL without
  /// its fragment.
  pub fn cache_key(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.into()
  }

  /// Only GET requests are matched against or written to the cache.
  pub fn is_cacheable_method(&self) -> bool {
    self.method == Method::GET
  }
}

/// How the response relates to the application origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  /// Same origin as the application
  Basic,
  /// Cross-origin, readable
  Cors,
  /// Cross-origin, unreadable
  Opaque,
  /// Synthetic network error response
  Error,
}

impl ResponseKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResponseKind::Basic => "basic",
      ResponseKind::Cors => "cors",
      ResponseKind::Opaque => "opaque",
      ResponseKind::Error => "error",
    }
  }
}

impl fmt::Display for ResponseKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ResponseKind {
  type Err = color_eyre::Report;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "basic" => Ok(ResponseKind::Basic),
      "cors" => Ok(ResponseKind::Cors),
      "opaque" => Ok(ResponseKind::Opaque),
      "error" => Ok(ResponseKind::Error),
      other => Err(eyre!("Unknown response kind '{}'", other)),
    }
  }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
  pub status: u16,
  pub kind: ResponseKind,
  /// Final URL after redirects
  pub url: Url,
  pub headers: ResponseHeaders,
  pub body: Vec<u8>,
}

impl FetchResponse {
  /// Whether the status is in the 2xx range
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Every value received under `name`, in order
  #[cfg(test)]
  pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
    self
      .headers
      .iter()
      .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_slice())
  }
}

/// Something that can carry a request to a response.
///
/// `Err` is a transport failure (refused connection, DNS, offline). Any HTTP
/// status, 4xx and 5xx included, is an `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    (**self).fetch(request).await
  }
}
