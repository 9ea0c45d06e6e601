//! String key/value backends.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum KvError {
  #[error("key/value database error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("failed to create preferences directory: {0}")]
  Io(#[from] std::io::Error),
  #[error("could not determine data directory")]
  NoDataDir,
  #[error("preferences lock poisoned")]
  Poisoned,
}

/// A string key/value store.
pub trait KvStore {
  fn get_item(&self, key: &str) -> Result<Option<String>, KvError>;

  fn set_item(&self, key: &str, value: &str) -> Result<(), KvError>;

  fn remove_item(&self, key: &str) -> Result<(), KvError>;

  /// Whether something outside this handle wrote since the last call.
  fn external_change(&self) -> Result<bool, KvError> {
    Ok(false)
  }
}

/// Process-local store, used when persistence is disabled and in tests.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
  items: RefCell<HashMap<String, String>>,
}

impl KvStore for MemoryKvStore {
  fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
    Ok(self.items.borrow().get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
    self
      .items
      .borrow_mut()
      .insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), KvError> {
    self.items.borrow_mut().remove(key);
    Ok(())
  }
}

/// SQLite-backed store. Writes from other connections to the same file are
/// picked up through `PRAGMA data_version`.
pub struct SqliteKvStore {
  conn: Mutex<Connection>,
  data_version: AtomicI64,
}

impl SqliteKvStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self, KvError> {
    Self::open(&Self::default_path()?)
  }

  pub fn open(path: &Path) -> Result<Self, KvError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::from_connection(Connection::open(path)?)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, KvError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, KvError> {
    conn.execute_batch(KV_SCHEMA)?;
    let version = read_data_version(&conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
      data_version: AtomicI64::new(version),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, KvError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(KvError::NoDataDir)?;

    Ok(data_dir.join("holocron").join("prefs.db"))
  }

  fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, KvError> {
    self.conn.lock().map_err(|_| KvError::Poisoned)
  }
}

fn read_data_version(conn: &Connection) -> Result<i64, KvError> {
  Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

impl KvStore for SqliteKvStore {
  fn get_item(&self, key: &str) -> Result<Option<String>, KvError> {
    let conn = self.conn()?;
    let value = conn
      .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get(0)
      })
      .optional()?;
    Ok(value)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<(), KvError> {
    let conn = self.conn()?;
    conn.execute(
      r#"
      INSERT INTO kv (key, value, updated_at)
      VALUES (?1, ?2, datetime('now'))
      ON CONFLICT(key) DO UPDATE SET
          value = excluded.value,
          updated_at = excluded.updated_at
      "#,
      params![key, value],
    )?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<(), KvError> {
    let conn = self.conn()?;
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
  }

  fn external_change(&self) -> Result<bool, KvError> {
    let conn = self.conn()?;
    let version = read_data_version(&conn)?;
    let previous = self.data_version.swap(version, Ordering::Relaxed);
    Ok(previous != version)
  }
}

const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_store() {
    let store = MemoryKvStore::default();
    assert_eq!(store.get_item("a").unwrap(), None);
    store.set_item("a", "1").unwrap();
    assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));
    store.remove_item("a").unwrap();
    assert_eq!(store.get_item("a").unwrap(), None);
    assert!(!store.external_change().unwrap());
  }

  #[test]
  fn test_sqlite_upsert() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    store.set_item("table.people.sort", "name").unwrap();
    store.set_item("table.people.sort", "-height").unwrap();
    assert_eq!(
      store.get_item("table.people.sort").unwrap().as_deref(),
      Some("-height")
    );
    store.remove_item("table.people.sort").unwrap();
    assert_eq!(store.get_item("table.people.sort").unwrap(), None);
  }

  #[test]
  fn test_sqlite_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("prefs.db");

    SqliteKvStore::open(&path)
      .unwrap()
      .set_item("table.planets.cols", "name,climate")
      .unwrap();

    let reopened = SqliteKvStore::open(&path).unwrap();
    assert_eq!(
      reopened.get_item("table.planets.cols").unwrap().as_deref(),
      Some("name,climate")
    );
  }

  #[test]
  fn test_external_change_seen_only_from_other_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.db");
    let ours = SqliteKvStore::open(&path).unwrap();
    let theirs = SqliteKvStore::open(&path).unwrap();

    ours.set_item("k", "mine").unwrap();
    assert!(!ours.external_change().unwrap());

    theirs.set_item("k", "theirs").unwrap();
    assert!(ours.external_change().unwrap());
    assert!(!ours.external_change().unwrap());
    assert_eq!(ours.get_item("k").unwrap().as_deref(), Some("theirs"));
  }
}
