//! Offline cache worker: install, fetch interception and activation.

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::storage::CacheStorage;
use crate::config::OfflineConfig;
use crate::net::{FetchRequest, FetchResponse, ResponseKind, Transport};

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Created, manifest not yet stored
  Installing,
  /// Manifest stored, waiting to be activated
  Installed,
  /// Removing stale buckets
  Activating,
  /// Serving fetches
  Activated,
  /// Install failed or superseded by a newer worker
  Redundant,
}

impl WorkerState {
  pub fn label(&self) -> &'static str {
    match self {
      WorkerState::Installing => "installing",
      WorkerState::Installed => "installed",
      WorkerState::Activating => "activating",
      WorkerState::Activated => "activated",
      WorkerState::Redundant => "redundant",
    }
  }
}

/// Which policy handled a request. Surfaced for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
  Passthrough,
  NetworkFirst,
  CacheFirst,
}

/// One worker per cache bucket version.
pub struct CacheWorker<S: CacheStorage> {
  version: String,
  /// Origin root ("https://host/") the worker controls
  scope: Url,
  manifest: Vec<String>,
  api_prefix: String,
  storage: Arc<S>,
  network: Arc<dyn Transport>,
  state: Mutex<WorkerState>,
  /// Outstanding fire-and-forget cache writes
  pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: CacheStorage> CacheWorker<S> {
  pub fn new(
    config: &OfflineConfig,
    scope: Url,
    storage: Arc<S>,
    network: Arc<dyn Transport>,
  ) -> Result<Self> {
    if config.version.trim().is_empty() {
      return Err(eyre!("Offline cache version must not be empty"));
    }

    Ok(Self {
      version: config.version.clone(),
      scope,
      manifest: config.manifest.clone(),
      api_prefix: config.api_prefix.clone(),
      storage,
      network,
      state: Mutex::new(WorkerState::Installing),
      pending_writes: Mutex::new(Vec::new()),
    })
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  pub fn state(&self) -> WorkerState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(WorkerState::Redundant)
  }

  fn set_state(&self, next: WorkerState) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    debug!(version = %self.version, from = state.label(), to = next.label(), "worker state");
    *state = next;
    Ok(())
  }

  fn expect_state(&self, expected: WorkerState, action: &str) -> Result<()> {
    let current = self.state();
    if current != expected {
      return Err(eyre!(
        "Cannot {} worker {} while {}",
        action,
        self.version,
        current.label()
      ));
    }
    Ok(())
  }

  /// Whether a previous run already installed this version
  pub fn is_installed_in_storage(&self) -> Result<bool> {
    self.storage.has_bucket(&self.version)
  }

  /// Fetch and store every manifest entry, all or nothing.
  ///
  /// On failure the worker becomes redundant and nothing from this attempt is
  /// visible in the bucket.
  pub async fn install(&self) -> Result<()> {
    self.expect_state(WorkerState::Installing, "install")?;
    info!(version = %self.version, entries = self.manifest.len(), "installing offline cache");

    match self.precache().await {
      Ok(()) => {
        self.set_state(WorkerState::Installed)?;
        info!(version = %self.version, "offline cache installed");
        Ok(())
      }
      Err(e) => {
        self.set_state(WorkerState::Redundant)?;
        warn!(version = %self.version, error = %e, "offline cache install failed");
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<()> {
    let requests = self
      .manifest
      .iter()
      .map(|path| {
        self
          .scope
          .join(path)
          .map(FetchRequest::get)
          .map_err(|e| eyre!("Invalid manifest entry '{}': {}", path, e))
      })
      .collect::<Result<Vec<_>>>()?;

    let entries = futures::future::try_join_all(requests.into_iter().map(|request| async move {
      let key = request.cache_key();
      let response = self.network.fetch(request).await?;
      if !response.ok() {
        return Err(eyre!(
          "Pre-cache of {} failed with status {}",
          key,
          response.status
        ));
      }
      Ok::<_, color_eyre::Report>((key, response))
    }))
    .await?;

    self.storage.put_all(&self.version, &entries)
  }

  /// Take over from a previous run whose install of this version completed.
  ///
  /// That run may have died before pruning, so stale buckets go here too.
  pub fn resume(&self) -> Result<()> {
    self.expect_state(WorkerState::Installing, "resume")?;
    if !self.is_installed_in_storage()? {
      return Err(eyre!("Cache bucket {} was never installed", self.version));
    }
    self.set_state(WorkerState::Installed)?;
    self.finish_activation()?;
    info!(version = %self.version, "resumed offline cache");
    Ok(())
  }

  /// Delete every bucket except this version's, then start serving.
  pub fn activate(&self) -> Result<()> {
    self.expect_state(WorkerState::Installed, "activate")?;
    self.finish_activation()?;
    info!(version = %self.version, "offline cache activated");
    Ok(())
  }

  fn finish_activation(&self) -> Result<()> {
    self.set_state(WorkerState::Activating)?;

    if let Err(e) = self.delete_stale_buckets() {
      self.set_state(WorkerState::Redundant)?;
      return Err(e);
    }

    self.set_state(WorkerState::Activated)
  }

  fn delete_stale_buckets(&self) -> Result<()> {
    for name in self.storage.bucket_names()? {
      if name == self.version {
        continue;
      }
      if self.storage.delete_bucket(&name)? {
        info!(bucket = %name, "deleted stale cache bucket");
      }
    }
    Ok(())
  }

  pub(crate) fn mark_redundant(&self) {
    if let Err(e) = self.set_state(WorkerState::Redundant) {
      warn!(version = %self.version, error = %e, "failed to retire worker");
    }
  }

  fn route(&self, request: &FetchRequest) -> Route {
    if request.url.origin() != self.scope.origin() {
      Route::Passthrough
    } else if request.url.path().contains(&self.api_prefix) {
      Route::NetworkFirst
    } else {
      Route::CacheFirst
    }
  }

  /// Intercept one outgoing request.
  pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    let route = self.route(&request);
    debug!(url = %request.url, ?route, "intercept");

    match route {
      Route::Passthrough => self.network.fetch(request).await,
      Route::NetworkFirst => self.network_first(request).await,
      Route::CacheFirst => self.cache_first(request).await,
    }
  }

  async fn network_first(&self, request: FetchRequest) -> Result<FetchResponse> {
    let key = request.cache_key();
    let cacheable = request.is_cacheable_method();

    match self.network.fetch(request).await {
      Ok(response) => Ok(response),
      Err(err) => {
        if cacheable {
          if let Some(cached) = self.lookup(&key) {
            info!(url = %key, error = %err, "network failed, serving cached response");
            return Ok(cached);
          }
        }
        Err(err)
      }
    }
  }

  async fn cache_first(&self, request: FetchRequest) -> Result<FetchResponse> {
    if !request.is_cacheable_method() {
      return self.network.fetch(request).await;
    }

    let key = request.cache_key();
    if let Some(cached) = self.lookup(&key) {
      return Ok(cached);
    }

    let response = self.network.fetch(request).await?;
    if response.status == 200 && response.kind == ResponseKind::Basic {
      self.store_in_background(key, response.clone());
    }
    Ok(response)
  }

  /// Read failures count as a miss
  fn lookup(&self, key: &str) -> Option<FetchResponse> {
    match self.storage.lookup(&self.version, key) {
      Ok(entry) => entry.map(|e| e.response),
      Err(e) => {
        warn!(url = %key, error = %e, "cache read failed");
        None
      }
    }
  }

  fn store_in_background(&self, key: String, response: FetchResponse) {
    let storage = Arc::clone(&self.storage);
    let bucket = self.version.clone();

    let handle = tokio::task::spawn_blocking(move || {
      if let Err(e) = storage.put(&bucket, &key, &response) {
        debug!(url = %key, error = %e, "cache write dropped");
      }
    });

    match self.pending_writes.lock() {
      Ok(mut pending) => {
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
      }
      Err(e) => warn!(error = %e, "pending write list poisoned"),
    }
  }

  /// Wait for every cache write started so far.
  pub async fn settle(&self) {
    let handles = match self.pending_writes.lock() {
      Ok(mut pending) => std::mem::take(&mut *pending),
      Err(_) => return,
    };
    for handle in handles {
      let _ = handle.await;
    }
  }
}
