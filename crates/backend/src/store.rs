//! SQLite event log.
//!
//! One append-only `events` table. The connection sits behind a mutex so
//! appends from any thread are serialised at the store boundary.

use std::{
  path::{Path, PathBuf},
  sync::{Mutex, MutexGuard},
  time::Duration,
};

use chrono::{DateTime, NaiveDateTime, Utc};
use pqwatch_core::{ClassificationEvent, StoredEvent};
use rusqlite::{Connection, params};
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  timestamp TEXT NOT NULL,
  filename TEXT NOT NULL,
  classification TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("failed to create database directory {}: {source}", path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),
  #[error("event store lock poisoned")]
  Poisoned,
  #[error("event {id} has an unreadable timestamp '{value}'")]
  InvalidTimestamp { id: i64, value: String },
}

pub struct EventStore {
  conn: Mutex<Connection>,
  path: Option<PathBuf>,
}

impl std::fmt::Debug for EventStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventStore").field("path", &self.path).finish()
  }
}

impl EventStore {
  /// Open (creating if needed) the database at `path` and ensure the schema
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    let conn = Connection::open(path)?;
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    // The archive move follows each append, so the commit must be on disk first
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    debug!(db = %path.display(), journal_mode = %mode, "Opened event store");

    let store = Self {
      conn: Mutex::new(conn),
      path: Some(path.to_path_buf()),
    };
    store.ensure_schema()?;
    info!(db = %path.display(), "Event store ready");
    Ok(store)
  }

  pub fn open_in_memory() -> Result<Self, StoreError> {
    let store = Self {
      conn: Mutex::new(Connection::open_in_memory()?),
      path: None,
    };
    store.ensure_schema()?;
    Ok(store)
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  /// Create the table and index if absent. Safe to call any number of times.
  pub fn ensure_schema(&self) -> Result<(), StoreError> {
    self.lock()?.execute_batch(SCHEMA)?;
    Ok(())
  }

  /// Durably insert one event, returning its id
  pub fn append(&self, event: &ClassificationEvent) -> Result<i64, StoreError> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT INTO events (timestamp, filename, classification) VALUES (?1, ?2, ?3)",
      params![event.timestamp_rfc3339(), event.filename, event.label],
    )?;
    Ok(conn.last_insert_rowid())
  }

  pub fn count(&self) -> Result<u64, StoreError> {
    let count: i64 = self.lock()?.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    Ok(count as u64)
  }

  /// Most recent events, newest first
  pub fn recent(&self, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
    let conn = self.lock()?;
    let mut stmt =
      conn.prepare("SELECT id, timestamp, filename, classification FROM events ORDER BY id DESC LIMIT ?1")?;
    let rows = stmt.query_map([limit as i64], |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
      ))
    })?;

    let mut events = Vec::new();
    for row in rows {
      let (id, timestamp, filename, label) = row?;
      events.push(StoredEvent {
        id,
        event: ClassificationEvent {
          timestamp: parse_timestamp(id, &timestamp)?,
          filename,
          label,
        },
      });
    }
    Ok(events)
  }

  /// Latest event recorded for `filename`, if any
  #[cfg(test)]
  pub(crate) fn last_for_file(&self, filename: &str) -> Result<Option<i64>, StoreError> {
    use rusqlite::OptionalExtension;

    let id = self
      .lock()?
      .query_row(
        "SELECT id FROM events WHERE filename = ?1 ORDER BY id DESC LIMIT 1",
        [filename],
        |row| row.get(0),
      )
      .optional()?;
    Ok(id)
  }
}

/// RFC 3339, or a naive ISO-8601 timestamp interpreted as UTC
fn parse_timestamp(id: i64, value: &str) -> Result<DateTime<Utc>, StoreError> {
  if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
    return Ok(ts.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|_| StoreError::InvalidTimestamp {
      id,
      value: value.to_string(),
    })
}
