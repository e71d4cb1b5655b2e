//! Opening the history store.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};

/// Path that selects a private in-memory store.
pub const MEMORY_STORE: &str = ":memory:";

/// A pool of connections to the history store.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection tunables, taken from the `[history]` config table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create history directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open history store: {0}")]
    Open(#[source] r2d2::Error),

    #[error("failed to check out a history connection: {0}")]
    Connection(#[source] r2d2::Error),

    #[error(transparent)]
    Migrate(#[from] MigrationError),
}

/// Opens the history store at `path` and brings its schema up to date.
///
/// Missing parent directories are created. [`MEMORY_STORE`] opens a
/// throwaway database; every in-memory connection is its own database, so
/// that pool is capped at one connection whatever `settings` says.
pub fn open_store(path: &str, settings: StoreSettings) -> Result<DbPool, StoreError> {
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);

    let (manager, max_size) = if path == MEMORY_STORE {
        (SqliteConnectionManager::memory(), 1)
    } else {
        ensure_parent_dir(Path::new(path))?;
        (SqliteConnectionManager::file(path), settings.pool_max_size)
    };
    let manager = manager.with_init(move |conn| apply_pragmas(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(StoreError::Open)?;

    let applied = {
        let conn = pool.get().map_err(StoreError::Connection)?;
        run_migrations(&conn)?
    };
    if applied > 0 {
        tracing::info!(count = applied, path, "applied history migrations");
    }

    Ok(pool)
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            }),
        _ => Ok(()),
    }
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // In-memory databases stay in "memory" mode.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("history store refused WAL mode ({})", mode)),
        ));
    }
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)
}
