//! SQLite-backed key-value store.
//!
//! This module handles opening the database, applying pragmas for WAL mode,
//! running migrations, and staging writes until they are flushed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use super::{KeyValueBackend, migrations};
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;";

/// Cache store on a single `kv` table.
///
/// Writes and deletes are staged in memory: reads through this instance see
/// them at once, other connections see them after [`KeyValueBackend::flush`]
/// commits the staged set in one transaction.
///
/// Dropping an open backend flushes whatever is still staged. A failure there
/// can only be logged, so callers that need to know use `close`.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Option<Connection>,
    /// Staged changes; `None` marks a pending delete.
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl SqliteBackend {
    /// Open a database at the specified path.
    ///
    /// Creates the file (and its parent directory) if it doesn't exist,
    /// applies pragmas, and runs any pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened sqlite cache backend");
        Self::init(conn)
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        conn.execute_batch(PRAGMAS)?;
        migrations::run(&conn)?;
        Ok(Self { conn: Some(conn), staged: BTreeMap::new() })
    }

    /// Number of writes and deletes waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    fn conn(&self) -> Result<&Connection, Error> {
        self.conn.as_ref().ok_or(Error::Closed)
    }
}

impl KeyValueBackend for SqliteBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let conn = self.conn()?;
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }

        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.conn()?;
        self.staged.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), Error> {
        self.conn()?;
        self.staged.insert(key.to_vec(), None);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv")?;
        let mut keys = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;

        for (key, value) in &self.staged {
            match value {
                Some(_) => keys.insert(key.clone()),
                None => keys.remove(key),
            };
        }

        Ok(keys.into_iter().collect())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let conn = self.conn.as_mut().ok_or(Error::Closed)?;
        if self.staged.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            let mut remove = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
            for (key, value) in &self.staged {
                match value {
                    Some(value) => upsert.execute(params![key, value])?,
                    None => remove.execute(params![key])?,
                };
            }
        }
        tx.commit()?;

        tracing::info!(changes = self.staged.len(), "flushed staged cache writes");
        self.staged.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if self.conn.is_none() {
            return Ok(());
        }

        self.flush()?;
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::Database(e))?;
        }
        tracing::info!("closed sqlite cache backend");
        Ok(())
    }
}

impl Drop for SqliteBackend {
    fn drop(&mut self) {
        if self.conn.is_none() || self.staged.is_empty() {
            return;
        }
        let pending = self.staged.len();
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, pending, "dropping sqlite cache backend lost staged writes");
        }
    }
}
