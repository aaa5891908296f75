//! Cache bucket storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use url::Url;

use crate::net::{FetchResponse, ResponseHeaders};

/// A response read back from a bucket.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: FetchResponse,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for named, versioned cache bucket backends.
///
/// Writes to one key are last-writer-wins. No transaction spans more than one
/// call except `put_all`, which is all-or-nothing.
pub trait CacheStorage: Send + Sync + 'static {
  /// Names of all existing buckets, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  /// Whether a bucket exists.
  fn has_bucket(&self, bucket: &str) -> Result<bool>;

  /// Delete a bucket and all of its entries. Returns false if it did not exist.
  fn delete_bucket(&self, bucket: &str) -> Result<bool>;

  /// Create the bucket if needed and store every entry, atomically.
  fn put_all(&self, bucket: &str, entries: &[(String, FetchResponse)]) -> Result<()>;

  /// Store one entry in an existing bucket.
  ///
  /// Fails if the bucket was deleted, so a late write cannot resurrect a
  /// bucket that activation already removed.
  fn put(&self, bucket: &str, key: &str, response: &FetchResponse) -> Result<()>;

  /// Look up an entry by request key.
  fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CachedEntry>>;

  /// Request keys stored in a bucket.
  fn keys(&self, bucket: &str) -> Result<Vec<String>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    let path = crate::config::data_dir()?.join("offline-cache.db");
    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One stored response per (bucket, request URL)
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    request_url TEXT NOT NULL,
    status INTEGER NOT NULL,
    kind TEXT NOT NULL,
    response_url TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, key_hash)
);
"#;

/// SHA256 of the request key, for stable fixed-length primary keys
pub fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

fn insert_entry(conn: &Connection, bucket: &str, key: &str, response: &FetchResponse) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries
         (bucket, key_hash, request_url, status, kind, response_url, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        bucket,
        key_hash(key),
        key,
        response.status,
        response.kind.as_str(),
        response.url.as_str(),
        headers,
        response.body,
      ],
    )
    .map_err(|e| eyre!("Failed to store cache entry for {}: {}", key, e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_buckets ORDER BY created_at, rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache buckets: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache bucket name: {}", e))?;

    Ok(names)
  }

  fn has_bucket(&self, bucket: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let found: Option<i64> = conn
      .query_row(
        "SELECT 1 FROM cache_buckets WHERE name = ?",
        params![bucket],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache bucket {}: {}", bucket, e))?;

    Ok(found.is_some())
  }

  fn delete_bucket(&self, bucket: &str) -> Result<bool> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM cache_entries WHERE bucket = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", bucket, e))?;
    let removed = tx
      .execute("DELETE FROM cache_buckets WHERE name = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete cache bucket {}: {}", bucket, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn put_all(&self, bucket: &str, entries: &[(String, FetchResponse)]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Dropping the transaction on an early return rolls everything back
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_buckets (name, created_at) VALUES (?, datetime('now'))",
      params![bucket],
    )
    .map_err(|e| eyre!("Failed to create cache bucket {}: {}", bucket, e))?;

    for (key, response) in entries {
      insert_entry(&tx, bucket, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn put(&self, bucket: &str, key: &str, response: &FetchResponse) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let exists: Option<i64> = tx
      .query_row(
        "SELECT 1 FROM cache_buckets WHERE name = ?",
        params![bucket],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache bucket {}: {}", bucket, e))?;

    if exists.is_none() {
      return Err(eyre!("Cache bucket {} does not exist", bucket));
    }

    insert_entry(&tx, bucket, key, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(u16, String, String, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, kind, response_url, headers, body, cached_at FROM cache_entries
         WHERE bucket = ? AND key_hash = ?",
        params![bucket, key_hash(key)],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache entry for {}: {}", key, e))?;

    let Some((status, kind, response_url, headers, body, cached_at)) = row else {
      return Ok(None);
    };

    let headers: ResponseHeaders = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Failed to deserialize cached headers for {}: {}", key, e))?;
    let url = Url::parse(&response_url)
      .map_err(|e| eyre!("Invalid cached response URL '{}': {}", response_url, e))?;

    Ok(Some(CachedEntry {
      response: FetchResponse {
        status,
        kind: kind.parse()?,
        url,
        headers,
        body,
      },
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn keys(&self, bucket: &str) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT request_url FROM cache_entries WHERE bucket = ? ORDER BY request_url")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map(params![bucket], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list keys of {}: {}", bucket, e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache key: {}", e))?;

    Ok(keys)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::ResponseKind;

  fn response(url: &str, body: &[u8]) -> FetchResponse {
    FetchResponse {
      status: 200,
      kind: ResponseKind::Basic,
      url: Url::parse(url).unwrap(),
      headers: vec![("content-type".to_string(), b"image/png".to_vec())],
      body: body.to_vec(),
    }
  }

  #[test]
  fn test_put_all_then_lookup_is_byte_identical() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let body = vec![0u8, 159, 146, 150, 255];
    let stored = response("http://localhost/logo192.png", &body);

    storage
      .put_all(
        "grocer-v1",
        &[("http://localhost/logo192.png".to_string(), stored.clone())],
      )
      .unwrap();

    let entry = storage
      .lookup("grocer-v1", "http://localhost/logo192.png")
      .unwrap()
      .unwrap();
    assert_eq!(entry.response, stored);
    assert_eq!(entry.response.body, body);
  }

  #[test]
  fn test_repeated_and_binary_headers_survive() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = "http://localhost/session".to_string();
    let mut stored = response(&key, b"ok");
    stored.headers = vec![
      ("set-cookie".to_string(), b"a=1".to_vec()),
      ("vary".to_string(), b"accept".to_vec()),
      ("set-cookie".to_string(), b"b=2".to_vec()),
      ("x-raw".to_string(), vec![b'n', 0xe9, b'e']),
    ];

    storage.put_all("grocer-v1", &[(key.clone(), stored.clone())]).unwrap();

    let entry = storage.lookup("grocer-v1", &key).unwrap().unwrap();
    assert_eq!(entry.response.headers, stored.headers);
    let cookies: Vec<&[u8]> = entry.response.header_values("set-cookie").collect();
    assert_eq!(cookies, vec![b"a=1".as_slice(), b"b=2".as_slice()]);
  }

  #[test]
  fn test_concurrent_puts_to_one_key_keep_one_writer() {
    let storage = std::sync::Arc::new(SqliteStorage::open_in_memory().unwrap());
    let key = "http://localhost/app.js".to_string();
    storage.put_all("grocer-v1", &[]).unwrap();

    let bodies: Vec<Vec<u8>> = (0..8).map(|i| format!("build-{}", i).into_bytes()).collect();
    std::thread::scope(|scope| {
      for body in &bodies {
        let storage = std::sync::Arc::clone(&storage);
        let key = key.clone();
        scope.spawn(move || storage.put("grocer-v1", &key, &response(&key, body)).unwrap());
      }
    });

    assert_eq!(storage.keys("grocer-v1").unwrap(), vec![key.clone()]);
    let entry = storage.lookup("grocer-v1", &key).unwrap().unwrap();
    assert!(bodies.contains(&entry.response.body));
    assert_eq!(entry.response, response(&key, &entry.response.body));
  }

  #[test]
  fn test_lookup_is_scoped_to_bucket() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = "http://localhost/index.html".to_string();
    storage
      .put_all("grocer-v1", &[(key.clone(), response(&key, b"v1"))])
      .unwrap();

    assert!(storage.lookup("grocer-v2", &key).unwrap().is_none());
    assert!(storage.lookup("grocer-v1", &key).unwrap().is_some());
  }

  #[test]
  fn test_put_overwrites_same_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = "http://localhost/app.js".to_string();
    storage
      .put_all("grocer-v1", &[(key.clone(), response(&key, b"old"))])
      .unwrap();
    storage
      .put("grocer-v1", &key, &response(&key, b"new"))
      .unwrap();

    let entry = storage.lookup("grocer-v1", &key).unwrap().unwrap();
    assert_eq!(entry.response.body, b"new");
    assert_eq!(storage.keys("grocer-v1").unwrap(), vec![key]);
  }

  #[test]
  fn test_put_into_missing_bucket_fails() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = "http://localhost/app.js";
    assert!(storage.put("gone", key, &response(key, b"x")).is_err());
    assert!(!storage.has_bucket("gone").unwrap());
  }

  #[test]
  fn test_delete_bucket_removes_entries() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let key = "http://localhost/".to_string();
    storage
      .put_all("grocer-v0", &[(key.clone(), response(&key, b"old"))])
      .unwrap();
    storage.put_all("grocer-v1", &[]).unwrap();

    assert!(storage.delete_bucket("grocer-v0").unwrap());
    assert!(!storage.delete_bucket("grocer-v0").unwrap());
    assert_eq!(storage.bucket_names().unwrap(), vec!["grocer-v1"]);
    assert!(storage.lookup("grocer-v0", &key).unwrap().is_none());
  }

  #[test]
  fn test_database_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let key = "http://localhost/index.html".to_string();

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage
        .put_all("grocer-v1", &[(key.clone(), response(&key, b"<html>"))])
        .unwrap();
    }

    let storage = SqliteStorage::open_at(&path).unwrap();
    assert!(storage.has_bucket("grocer-v1").unwrap());
    let entry = storage.lookup("grocer-v1", &key).unwrap().unwrap();
    assert_eq!(entry.response.body, b"<html>");
  }

  #[test]
  fn test_key_hash_is_stable_hex() {
    let a = key_hash("http://localhost/");
    assert_eq!(a.len(), 64);
    assert_eq!(a, key_hash("http://localhost/"));
    assert_ne!(a, key_hash("http://localhost/index.html"));
  }
}
