use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Named string records, the durable home of the persisted store
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Database connection wrapper for local state
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at the default location
  pub fn open() -> Result<Self> {
    let path = crate::config::data_dir()?.join("local.db");
    Self::open_at(&path)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self { conn };
    db.run_migrations()?;

    Ok(db)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    let db = Self { conn };
    db.run_migrations()?;
    Ok(db)
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  pub fn get_item(&self, name: &str) -> Result<Option<String>> {
    self
      .conn
      .query_row(
        "SELECT value FROM local_storage WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read record {}: {}", name, e))
  }

  pub fn set_item(&self, name: &str, value: &str) -> Result<()> {
    self
      .conn
      .execute(
        "INSERT OR REPLACE INTO local_storage (name, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![name, value],
      )
      .map_err(|e| eyre!("Failed to write record {}: {}", name, e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_record_is_none() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.get_item("grocery-store").unwrap(), None);
  }

  #[test]
  fn test_set_item_replaces_value() {
    let db = Database::open_in_memory().unwrap();
    db.set_item("grocery-store", "{}").unwrap();
    db.set_item("grocery-store", r#"{"a":1}"#).unwrap();
    assert_eq!(db.get_item("grocery-store").unwrap().as_deref(), Some(r#"{"a":1}"#));
  }
}
