//! Async mutation abstraction for the event loop.
//!
//! Inspired by TanStack Query's `useMutation`: a `Mutation<I, T>` wraps an
//! async operation that takes an input, runs it on the tokio runtime and
//! hands the outcome back on a later tick without ever blocking rendering.
//!
//! # Example
//!
//! ```ignore
//! let client = grocery.clone();
//! let mut remove = Mutation::new(move |(aisle, id): (String, String)| {
//!     let client = client.clone();
//!     async move { client.remove_item(&aisle, &id).await.map_err(|e| e.to_string()) }
//! });
//!
//! remove.mutate(("Dairy".into(), "42".into()));
//!
//! // In event loop tick
//! if let Some(outcome) = remove.poll() {
//!     match outcome {
//!         Ok(list) => store.set_items(list),
//!         Err(e) => show_error(e),
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::oneshot;

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures from an input
type MutateFn<I, T> = Box<dyn Fn(I) -> BoxFuture<T> + Send + Sync>;

/// Async operation started on demand and polled to completion.
pub struct Mutation<I, T> {
  mutate_fn: MutateFn<I, T>,
  receiver: Option<oneshot::Receiver<Result<T, String>>>,
}

impl<I, T: Send + 'static> Mutation<I, T> {
  pub fn new<F, Fut>(mutate_fn: F) -> Self
  where
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      mutate_fn: Box::new(move |input| Box::pin(mutate_fn(input))),
      receiver: None,
    }
  }

  /// Whether a run is in flight
  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start a run. A run still in flight is abandoned; its outcome is dropped.
  pub fn mutate(&mut self, input: I) {
    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);

    let future = (self.mutate_fn)(input);
    tokio::spawn(async move {
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(future.await);
    });
  }

  /// Take the outcome of the current run if it has finished.
  ///
  /// Returns each outcome exactly once. Call this in the tick handler.
  pub fn poll(&mut self) -> Option<Result<T, String>> {
    let receiver = self.receiver.as_mut()?;

    match receiver.try_recv() {
      Ok(outcome) => {
        self.receiver = None;
        Some(outcome)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        // Task dropped without sending
        self.receiver = None;
        Some(Err("Request was cancelled".to_string()))
      }
    }
  }
}

impl<I, T> std::fmt::Debug for Mutation<I, T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("pending", &self.receiver.is_some())
      .finish_non_exhaustive()
  }
}
