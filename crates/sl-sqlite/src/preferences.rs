//! Persistent editor preferences.

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;
use sl_gateway::{GatewayError, GatewayResult, StateStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Key/value preferences, scoped by the database file they belong to.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    connection: Arc<Mutex<Connection>>,
    scope: String,
}

impl PreferenceStore {
    /// Get the default preference database path.
    ///
    /// Priority order:
    /// 1. `SHEETLITE_HOME` environment variable
    /// 2. Platform-specific defaults:
    ///    - Linux: `${XDG_STATE_HOME:-~/.local/state}/sheetlite/preferences.db`
    ///    - macOS: `~/Library/Application Support/sheetlite/preferences.db`
    ///    - Windows: `%LOCALAPPDATA%\sheetlite\preferences.db`
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Ok(home) = std::env::var("SHEETLITE_HOME") {
            return Ok(PathBuf::from(home).join("preferences.db"));
        }

        #[cfg(target_os = "linux")]
        {
            let state_home = match std::env::var("XDG_STATE_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => home_dir()?.join(".local").join("state"),
            };
            Ok(state_home.join("sheetlite").join("preferences.db"))
        }

        #[cfg(target_os = "macos")]
        {
            Ok(home_dir()?
                .join("Library")
                .join("Application Support")
                .join("sheetlite")
                .join("preferences.db"))
        }

        #[cfg(target_os = "windows")]
        {
            let local_appdata = std::env::var("LOCALAPPDATA").map_err(|_| {
                crate::Error::generic("LOCALAPPDATA environment variable not set")
            })?;
            Ok(PathBuf::from(local_appdata).join("sheetlite").join("preferences.db"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(home_dir()?.join(".sheetlite").join("preferences.db"))
        }
    }

    /// Open (or create) the preference database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, scope: impl Into<String>) -> crate::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, scope)
    }

    /// Open the preference database at the default path.
    pub fn open_default(scope: impl Into<String>) -> crate::Result<Self> {
        Self::open(Self::default_path()?, scope)
    }

    /// Open an in-memory store for testing.
    pub fn open_in_memory(scope: impl Into<String>) -> crate::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, scope)
    }

    fn from_connection(conn: Connection, scope: impl Into<String>) -> crate::Result<Self> {
        crate::migrations::MigrationManager::migrate(&conn)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(conn)),
            scope: scope.into(),
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn set(&self, key: &str, value: Option<&str>) -> crate::Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO kv (scope, k, v)
            VALUES (?, ?, ?)
            "#,
            params![self.scope, key, value],
        )?;
        debug!(scope = %self.scope, key, "stored preference");
        Ok(())
    }

    pub fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT v FROM kv WHERE scope = ? AND k = ?")?;
        let mut rows = stmt.query_map(params![self.scope, key], |row| {
            row.get::<_, Option<String>>(0)
        })?;

        match rows.next() {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn lock(&self) -> crate::Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|e| {
            crate::Error::generic(format!("Failed to acquire preference lock: {}", e))
        })
    }
}

fn home_dir() -> crate::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| crate::Error::generic("HOME environment variable not set"))
}

#[async_trait]
impl StateStore for PreferenceStore {
    async fn get_state(&self, key: &str) -> GatewayResult<Option<Value>> {
        let store = self.clone();
        let owned = key.to_owned();
        let text = tokio::task::spawn_blocking(move || store.get(&owned))
            .await
            .map_err(|e| GatewayError::unexpected(format!("preference task failed: {}", e)))??;
        match text {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| GatewayError::unexpected(format!("corrupt preference {}: {}", key, e))),
            None => Ok(None),
        }
    }

    async fn set_state(&self, key: &str, value: Value) -> GatewayResult<()> {
        let text = serde_json::to_string(&value).map_err(crate::Error::from)?;
        let store = self.clone();
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || store.set(&key, Some(&text)))
            .await
            .map_err(|e| GatewayError::unexpected(format!("preference task failed: {}", e)))??;
        Ok(())
    }
}
