//! Async SQLite executor using a dedicated background thread.
//!
//! All store operations funnel through a single connection owned by one
//! background thread; callers await results without blocking the runtime.
//! FIFO execution on that thread is what makes the sync engine's dirty-row
//! guard sound: an inbound upsert can never interleave with an outbound
//! push's read-modify-write for the same row.

use crate::{migrations, StoreError, StoreResult};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Convert a tokio_rusqlite::Error to StoreError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> StoreError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => StoreError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => StoreError::Connection("Connection closed".to_string()),
        other => StoreError::Connection(other.to_string()),
    }
}

/// Handle to the local store.
///
/// Cloning is cheap; all clones share the same executor thread, so the
/// serialization guarantee holds across every handle.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    path: String,
}

impl Store {
    /// Open a store at the given path.
    ///
    /// Creates the file if missing, enables WAL and the usual pragmas, runs
    /// pending migrations, and starts the executor thread.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();

        info!(path = %path_str, "Opening store");

        let conn = Connection::open(&path_str)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA cache_size = -64000;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        Self::migrate(&conn).await?;

        info!(path = %path_str, "Store initialized with WAL mode");

        Ok(Self {
            conn,
            path: path_str,
        })
    }

    /// Open an in-memory store (tests, previews).
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;
        Self::migrate(&conn).await?;
        Ok(Self {
            conn,
            path: ":memory:".to_string(),
        })
    }

    async fn migrate(conn: &Connection) -> StoreResult<()> {
        conn.call(|conn| {
            migrations::run_migrations(conn)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)
    }

    /// Execute a closure on the store connection.
    ///
    /// The closure runs on the dedicated executor thread; the caller's task
    /// is parked, not blocked, until the result is ready. Only SQL and
    /// lightweight row mapping belong inside - anything heavier starves
    /// every other store caller.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let outer_result = self.conn.call(move |conn| Ok(f(conn))).await;

        match outer_result {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Execute a closure that returns a rusqlite::Result.
    pub async fn call_sqlite<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)?))
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Get the store file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check store health with a trivial query.
    pub async fn health_check(&self) -> StoreResult<()> {
        self.call_sqlite(|conn| conn.execute_batch("SELECT 1")).await?;
        debug!("Store health check passed");
        Ok(())
    }

    /// Close the store, waiting for pending operations to finish.
    pub async fn close(self) -> StoreResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to close store: {:?}", e)))?;
        info!(path = %self.path, "Store closed");
        Ok(())
    }
}
