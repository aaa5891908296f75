//! Offline cache worker.
//!
//! Models the install / fetch / activate lifecycle of a versioned offline
//! cache:
//! - install pre-caches a fixed manifest of static assets, all or nothing
//! - fetch intercepts every request: cross-origin passes through, API paths
//!   go network-first, everything else cache-first
//! - activate deletes every bucket but the current version's
//!
//! Buckets live in SQLite so an installed version keeps serving across runs.

mod registration;
mod storage;
mod worker;

pub use registration::Registration;
pub use storage::{CacheStorage, SqliteStorage};
pub use worker::{CacheWorker, WorkerState};
