//! Gateway error types

use crate::value::SqlValue;
use thiserror::Error;

/// Errors surfaced by a gateway implementation
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{message}\nQuery: {sql}\nParams: {}", format_params(.params))]
    Query {
        message: String,
        sql: String,
        params: Vec<SqlValue>,
    },

    #[error("This query is not allowed in the read-only mode.\nQuery: {sql}")]
    ReadOnly { sql: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("gateway connection closed")]
    Closed,

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl GatewayError {
    pub fn query(message: impl Into<String>, sql: impl Into<String>, params: &[SqlValue]) -> Self {
        Self::Query {
            message: message.into(),
            sql: sql.into(),
            params: params.to_vec(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

fn format_params(params: &[SqlValue]) -> String {
    serde_json::to_string(params).unwrap_or_else(|_| "<failed to serialize>".to_owned())
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_mentions_sql_and_params() {
        let err = GatewayError::query(
            "no such table: t",
            "SELECT * FROM t WHERE a = ?",
            &[SqlValue::Integer(1), SqlValue::Null],
        );
        let text = err.to_string();
        assert!(text.contains("no such table: t"));
        assert!(text.contains("SELECT * FROM t WHERE a = ?"));
        assert!(text.contains("[1,null]"));
    }
}
