//! Durable storage for the bearer token.
//!
//! The token is the only client state that survives a restart. It lives in a
//! small SQLite key/value table under the data directory.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Fixed key the token is stored under.
pub const TOKEN_KEY: &str = "auth_token";

/// Trait for token storage backends.
pub trait TokenStore: Send + Sync {
  fn load(&self) -> Result<Option<String>>;

  fn save(&self, token: &str) -> Result<()>;

  /// Remove the token. Succeeds when nothing is stored.
  fn clear(&self) -> Result<()>;
}

/// In-process store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
  token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
  pub fn with_token(token: &str) -> Self {
    Self {
      token: Mutex::new(Some(token.to_string())),
    }
  }
}

impl TokenStore for MemoryTokenStore {
  fn load(&self) -> Result<Option<String>> {
    Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
  }

  fn save(&self, token: &str) -> Result<()> {
    *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    Ok(())
  }
}

/// SQLite-backed key/value store.
pub struct SqliteTokenStore {
  conn: Mutex<Connection>,
}

impl SqliteTokenStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open state database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Directory holding the state database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cmsdeck"))
  }

  fn default_path() -> Result<PathBuf> {
    Ok(Self::data_dir()?.join("state.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STATE_SCHEMA)
      .map_err(|e| eyre!("Failed to run state migrations: {}", e))?;

    Ok(())
  }
}

const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS client_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

impl TokenStore for SqliteTokenStore {
  fn load(&self) -> Result<Option<String>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM client_state WHERE key = ?1",
        params![TOKEN_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read token: {}", e))
  }

  fn save(&self, token: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO client_state (key, value) VALUES (?1, ?2)",
        params![TOKEN_KEY, token],
      )
      .map_err(|e| eyre!("Failed to store token: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM client_state WHERE key = ?1", params![TOKEN_KEY])
      .map_err(|e| eyre!("Failed to clear token: {}", e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_roundtrip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.db");

    let store = SqliteTokenStore::open_at(&path).unwrap();
    assert_eq!(store.load().unwrap(), None);
    store.save("first").unwrap();
    store.save("second").unwrap();
    drop(store);

    let reopened = SqliteTokenStore::open_at(&path).unwrap();
    assert_eq!(reopened.load().unwrap().as_deref(), Some("second"));

    reopened.clear().unwrap();
    reopened.clear().unwrap();
    assert_eq!(reopened.load().unwrap(), None);
  }

  #[test]
  fn test_memory_store() {
    let store = MemoryTokenStore::with_token("abc");
    assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), None);
  }
}
