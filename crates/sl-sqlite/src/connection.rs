//! Database connection management.

use rusqlite::{Connection, OpenFlags};
use sl_gateway::{GatewayError, GatewayResult, RegexCache};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection to the database file being edited.
///
/// Unlike the preference store, no migrations are ever applied here: the
/// schema belongs to the user.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    last_data_version: Arc<Mutex<Option<i64>>>,
}

impl Database {
    /// Open a database file for reading and writing, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::from_connection(conn, Some(path.as_ref().to_path_buf()))
    }

    /// Open an existing database file without write access.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::from_connection(conn, Some(path.as_ref().to_path_buf()))
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> crate::Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        crate::functions::register_find_functions(&conn, Arc::new(RegexCache::new()))?;

        let version = Self::data_version(&conn)?;
        debug!(?path, data_version = version, "opened database");

        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            path,
            last_data_version: Arc::new(Mutex::new(Some(version))),
        })
    }

    /// Path of the underlying file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection for a synchronous unit of work.
    pub(crate) fn lock(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|e| {
            GatewayError::unexpected(format!("Failed to acquire database lock: {}", e))
        })
    }

    fn data_version(conn: &Connection) -> rusqlite::Result<i64> {
        conn.pragma_query_value(None, "data_version", |row| row.get(0))
    }

    /// Compare `PRAGMA data_version` with the value seen on the previous call.
    ///
    /// The pragma only changes when another connection commits, so writes
    /// issued through this connection never report as external.
    pub(crate) fn poll_data_version(&self) -> GatewayResult<bool> {
        let current = {
            let conn = self.lock()?;
            Self::data_version(&conn)
                .map_err(|e| GatewayError::query(e.to_string(), "PRAGMA data_version", &[]))?
        };

        let mut last = self.last_data_version.lock().map_err(|e| {
            GatewayError::unexpected(format!("Failed to acquire data version lock: {}", e))
        })?;
        let changed = matches!(*last, Some(previous) if previous != current);
        *last = Some(current);
        if changed {
            debug!(data_version = current, "external change detected");
        }
        Ok(changed)
    }
}
