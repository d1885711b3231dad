//! Error types for the editor core

use sl_gateway::GatewayError;
use thiserror::Error;

/// Errors that can occur while driving the editor
#[derive(Debug, Clone, Error)]
pub enum EditorError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A confirmation is already pending")]
    ConfirmationPending,

    #[error("No table is selected")]
    NoTableSelected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Application state error: {0}")]
    State(String),
}

impl EditorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type alias for editor operations
pub type EditorResult<T> = Result<T, EditorError>;
