//! Token database handle.
//!
//! One `rusqlite::Connection` is shared behind a mutex. Every statement runs
//! on tokio's blocking pool through [`Database::call`], so async callers never
//! stall a runtime worker on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

/// Connection settings applied to file-backed databases.
///
/// WAL lets lookups proceed while an issuance commits. `busy_timeout` makes a
/// second process wait for the write lock rather than fail.
const FILE_PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("busy_timeout", "5000"),
    ("temp_store", "MEMORY"),
];

/// Shared handle to the token database. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Option<Arc<PathBuf>>,
}

impl Database {
    /// Open or create the database file at `path`.
    ///
    /// Blocks on file I/O. Async callers want [`Database::open_and_migrate`].
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        for (name, value) in FILE_PRAGMAS {
            conn.pragma_update(None, name, value)?;
        }
        info!(path = %path.display(), "token database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: Some(Arc::new(path.to_path_buf())),
        })
    }

    /// A private database that disappears with the last clone.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("in-memory token database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: None,
        })
    }

    /// Open `path` off the runtime and bring its schema up to date.
    pub async fn open_and_migrate(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let db = tokio::task::spawn_blocking(move || Self::open(path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Apply every schema step the database has not seen yet.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        let version = self.call(migration::migrate).await?;
        debug!(version, "token schema ready");
        Ok(())
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.location.as_deref().map(PathBuf::as_path)
    }

    /// Run `f` with exclusive access to the connection on the blocking pool.
    ///
    /// ```ignore
    /// let live: i64 = db
    ///     .call(|conn| Ok(conn.query_row("SELECT count(*) FROM issued_tokens", [], |r| r.get(0))?))
    ///     .await?;
    /// ```
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&guard)
        })
        .await?
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}
