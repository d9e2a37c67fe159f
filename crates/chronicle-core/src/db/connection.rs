//! Database connection management

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::migrations;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Database wrapper for a SQLite connection
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &EngineConfig::default())
    }

    /// Open a database at the given path using the engine's busy timeout.
    pub fn open_with_config(path: impl AsRef<Path>, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let database = Self {
            conn: Connection::open(&path)?,
            path: Some(path),
        };
        database.configure(config.busy_timeout())?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let database = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        database.configure(EngineConfig::default().busy_timeout())?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent access
    fn configure(&self, busy_timeout: Duration) -> Result<()> {
        // WAL is unavailable for in-memory databases; the pragma reports the
        // mode it ended up in instead of failing.
        let _mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.busy_timeout(busy_timeout)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `op` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `op` reads anything, so version
    /// allocation and conflict scans see a stable view. Any error rolls the
    /// whole unit back. Retryable failures (busy database, version races)
    /// start over with a fresh transaction up to `max_retries` times and are
    /// then reported as [`Error::Conflict`].
    pub fn write<T>(
        &mut self,
        max_retries: u32,
        mut op: impl FnMut(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match self.write_once(&mut op) {
                Err(error) if error.is_retryable() => {
                    if attempt >= max_retries {
                        tracing::warn!("Write abandoned after {} attempts: {}", attempt + 1, error);
                        return Err(Error::Conflict(format!(
                            "write did not complete after {} attempts: {error}",
                            attempt + 1
                        )));
                    }
                    attempt += 1;
                    tracing::debug!("Retrying write (attempt {}): {}", attempt + 1, error);
                }
                other => return other,
            }
        }
    }

    fn write_once<T>(
        &mut self,
        op: &mut impl FnMut(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
