//! Query gateway contract for the sheetlite table editor
//!
//! The editor core never talks to a database directly. It issues SQL and
//! schema introspection requests through [`Gateway`] and persists UI
//! preferences through [`StateStore`].

pub mod error;
pub mod find;
pub mod queue;
pub mod schema;
pub mod state;
pub mod value;

pub use error::{GatewayError, GatewayResult};
pub use find::{FindMode, RegexCache};
pub use queue::{QueuedGateway, RequestId};
pub use schema::{ColumnInfo, IndexColumn, IndexEntry, IndexOrigin, TableKind, TableSchema};
pub use state::{MemoryStateStore, StateStore};
pub use value::{QueryMode, QueryResult, Record, SqlValue, ROWID_COLUMN};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Execute one statement (or a batch in [`QueryMode::Script`]).
    async fn query(&self, sql: &str, params: &[SqlValue], mode: QueryMode)
        -> GatewayResult<QueryResult>;

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>>;
    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>>;
    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>>;
    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>>;
    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>>;
    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>>;
    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool>;

    /// Read a file into a blob.
    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>>;
    /// Write a blob to a file.
    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()>;

    /// Whether the database was modified by another connection since the
    /// previous call.
    async fn external_change_detected(&self) -> GatewayResult<bool>;
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for Arc<G> {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> GatewayResult<QueryResult> {
        (**self).query(sql, params, mode).await
    }

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>> {
        (**self).table_list().await
    }

    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        (**self).table_info(table).await
    }

    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>> {
        (**self).index_list(table).await
    }

    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>> {
        (**self).index_info(index).await
    }

    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>> {
        (**self).table_schema(table).await
    }

    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>> {
        (**self).index_schema(index).await
    }

    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool> {
        (**self).has_table_autoincrement_column(table).await
    }

    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>> {
        (**self).import(path).await
    }

    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()> {
        (**self).export(path, bytes).await
    }

    async fn external_change_detected(&self) -> GatewayResult<bool> {
        (**self).external_change_detected().await
    }
}
