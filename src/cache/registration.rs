//! Hosting runtime for cache workers.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use super::storage::CacheStorage;
use super::worker::{CacheWorker, WorkerState};
use crate::net::{FetchRequest, FetchResponse, Transport};

/// Owns the controlling worker and routes every request through it.
///
/// Clients hold the registration as their transport, so a newly activated
/// worker takes over their next request without any restart.
pub struct Registration<S: CacheStorage> {
  network: Arc<dyn Transport>,
  controller: RwLock<Option<Arc<CacheWorker<S>>>>,
}

impl<S: CacheStorage> Registration<S> {
  pub fn new(network: Arc<dyn Transport>) -> Self {
    Self {
      network,
      controller: RwLock::new(None),
    }
  }

  /// Bring up a worker and make it the controller.
  ///
  /// A version already installed by an earlier run is resumed directly.
  /// Otherwise the worker installs and then activates. If either step fails
  /// the current controller, if any, keeps serving.
  pub async fn register(&self, worker: CacheWorker<S>) -> Result<()> {
    let worker = Arc::new(worker);

    if worker.is_installed_in_storage()? {
      worker.resume()?;
    } else {
      worker.install().await?;
      worker.activate()?;
    }

    let previous = {
      let mut controller = self
        .controller
        .write()
        .map_err(|e| eyre!("Lock poisoned: {}", e))?;
      controller.replace(Arc::clone(&worker))
    };

    if let Some(previous) = previous {
      info!(from = previous.version(), to = worker.version(), "offline cache superseded");
      previous.mark_redundant();
    }
    Ok(())
  }

  /// The worker currently serving requests.
  pub fn controller(&self) -> Option<Arc<CacheWorker<S>>> {
    match self.controller.read() {
      Ok(controller) => controller.clone(),
      Err(e) => {
        warn!(error = %e, "controller lock poisoned");
        None
      }
    }
  }

  /// Short status for display: version and lifecycle state
  pub fn status(&self) -> Option<(String, WorkerState)> {
    self
      .controller()
      .map(|w| (w.version().to_string(), w.state()))
  }

  /// Wait for the controller's outstanding cache writes.
  pub async fn settle(&self) {
    if let Some(worker) = self.controller() {
      worker.settle().await;
    }
  }
}

#[async_trait]
impl<S: CacheStorage> Transport for Registration<S> {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    match self.controller() {
      Some(worker) => worker.handle_fetch(request).await,
      None => self.network.fetch(request).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::config::OfflineConfig;
  use crate::net::testing::MockTransport;
  use crate::net::HttpTransport;
  use url::Url;

  const ORIGIN: &str = "http://localhost:8000/";

  fn worker(
    version: &str,
    manifest: &[&str],
    storage: &Arc<SqliteStorage>,
    network: Arc<dyn Transport>,
  ) -> CacheWorker<SqliteStorage> {
    let config = OfflineConfig {
      version: version.to_string(),
      manifest: manifest.iter().map(|s| s.to_string()).collect(),
      ..OfflineConfig::default()
    };
    CacheWorker::new(
      &config,
      Url::parse(ORIGIN).unwrap(),
      Arc::clone(storage),
      network,
    )
    .unwrap()
  }

  fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
  }

  #[tokio::test]
  async fn test_without_controller_requests_go_to_network() {
    let network = Arc::new(MockTransport::new());
    network.route(url("/index.html").as_str(), 200, "net");
    let registration: Registration<SqliteStorage> = Registration::new(network.clone());

    let response = registration
      .fetch(FetchRequest::get(url("/index.html")))
      .await
      .unwrap();

    assert_eq!(response.body, b"net");
    assert!(registration.controller().is_none());
  }

  #[tokio::test]
  async fn test_register_installs_and_takes_control() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let network = Arc::new(MockTransport::new());
    network.route(url("/index.html").as_str(), 200, "<html>");
    let registration = Registration::new(network.clone());

    registration
      .register(worker("grocer-v1", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    let (version, state) = registration.status().unwrap();
    assert_eq!(version, "grocer-v1");
    assert_eq!(state, WorkerState::Activated);

    network.set_offline(true);
    let response = registration
      .fetch(FetchRequest::get(url("/index.html")))
      .await
      .unwrap();
    assert_eq!(response.body, b"<html>");
  }

  #[tokio::test]
  async fn test_failed_upgrade_keeps_previous_controller() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let network = Arc::new(MockTransport::new());
    network.route(url("/index.html").as_str(), 200, "<html>v1");
    let registration = Registration::new(network.clone());
    registration
      .register(worker("grocer-v1", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    // v2 wants an asset the server cannot provide
    let result = registration
      .register(worker(
        "grocer-v2",
        &["/index.html", "/logo512.png"],
        &storage,
        network.clone(),
      ))
      .await;

    assert!(result.is_err());
    assert_eq!(registration.status().unwrap().0, "grocer-v1");
    assert_eq!(storage.bucket_names().unwrap(), vec!["grocer-v1"]);
  }

  #[tokio::test]
  async fn test_upgrade_retires_previous_and_prunes_bucket() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let network = Arc::new(MockTransport::new());
    network.route(url("/index.html").as_str(), 200, "<html>");
    let registration = Registration::new(network.clone());
    registration
      .register(worker("grocer-v1", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();
    let v1 = registration.controller().unwrap();

    registration
      .register(worker("grocer-v2", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    assert_eq!(v1.state(), WorkerState::Redundant);
    assert_eq!(registration.status().unwrap().0, "grocer-v2");
    assert_eq!(storage.bucket_names().unwrap(), vec!["grocer-v2"]);
  }

  #[tokio::test]
  async fn test_installed_version_resumes_offline() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let network = Arc::new(MockTransport::new());
    network.route(url("/index.html").as_str(), 200, "<html>");
    Registration::new(network.clone())
      .register(worker("grocer-v1", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    // Next run starts with no network at all
    network.set_offline(true);
    let registration = Registration::new(network.clone());
    registration
      .register(worker("grocer-v1", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    let response = registration
      .fetch(FetchRequest::get(url("/index.html")))
      .await
      .unwrap();
    assert_eq!(response.body, b"<html>");
  }

  #[tokio::test]
  async fn test_resumed_version_removes_older_buckets() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let network = Arc::new(MockTransport::new());
    storage.put_all("grocer-v1", &[]).unwrap();
    storage.put_all("grocer-v2", &[]).unwrap();

    let registration = Registration::new(network.clone());
    registration
      .register(worker("grocer-v2", &["/index.html"], &storage, network.clone()))
      .await
      .unwrap();

    assert_eq!(
      registration.status(),
      Some(("grocer-v2".to_string(), WorkerState::Activated))
    );
    assert_eq!(storage.bucket_names().unwrap(), vec!["grocer-v2"]);
    assert_eq!(network.request_count(), 0);
  }

  #[tokio::test]
  async fn test_serves_installed_assets_after_server_goes_away() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/index.html"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>grocer</html>"))
      .mount(&server)
      .await;

    let scope = Url::parse(&format!("{}/", server.uri())).unwrap();
    let network: Arc<dyn Transport> = Arc::new(HttpTransport::new(scope.origin()).unwrap());
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let config = OfflineConfig {
      manifest: vec!["/index.html".to_string()],
      ..OfflineConfig::default()
    };
    let registration = Registration::new(network.clone());
    registration
      .register(CacheWorker::new(&config, scope.clone(), Arc::clone(&storage), network).unwrap())
      .await
      .unwrap();

    drop(server);

    let response = registration
      .fetch(FetchRequest::get(scope.join("/index.html").unwrap()))
      .await
      .unwrap();
    assert_eq!(response.body, b"<html>grocer</html>");
  }
}
