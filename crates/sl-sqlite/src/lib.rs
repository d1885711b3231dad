//! SQLite backend for the sheetlite table editor.
//!
//! [`Database`] implements the [`sl_gateway::Gateway`] contract on top of a
//! single rusqlite connection, and [`PreferenceStore`] persists editor
//! preferences in a small key-value database of its own.

pub mod connection;
pub mod functions;
pub mod gateway;
pub mod migrations;
pub mod preferences;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for database operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic database error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new migration error.
    pub fn migration<S: Into<String>>(message: S) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Create a new generic database error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

impl From<Error> for sl_gateway::GatewayError {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => sl_gateway::GatewayError::from(e),
            other => sl_gateway::GatewayError::unexpected(other.to_string()),
        }
    }
}

pub use connection::Database;
pub use preferences::PreferenceStore;
