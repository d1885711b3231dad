//! Preference database migration management.

use rusqlite::{params, Connection};

/// Highest schema version this build knows how to use.
pub const LATEST_VERSION: u32 = 1;

/// Database migration manager.
pub struct MigrationManager;

impl MigrationManager {
    /// Apply all pending migrations to the database.
    pub fn migrate(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let current_version = Self::current_version(conn)?.unwrap_or(0);
        if current_version > LATEST_VERSION {
            return Err(crate::Error::migration(format!(
                "preference database is at version {} but this build only knows {}",
                current_version, LATEST_VERSION
            )));
        }

        if current_version < 1 {
            Self::apply_migration_1(conn)?;
        }

        Ok(())
    }

    /// Version 1: key/value preferences scoped by database file.
    fn apply_migration_1(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                scope TEXT NOT NULL,
                k TEXT NOT NULL,
                v TEXT,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                PRIMARY KEY (scope, k)
            );

            INSERT OR REPLACE INTO schema_migrations (version) VALUES (1);
            "#,
        )?;

        Ok(())
    }

    /// Get the current schema version.
    pub fn current_version(conn: &Connection) -> crate::Result<Option<u32>> {
        let mut stmt = conn.prepare("SELECT MAX(version) FROM schema_migrations")?;
        let version: Option<u32> = stmt.query_row(params![], |row| row.get(0))?;
        Ok(version)
    }
}
