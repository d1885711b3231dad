//! Gateway wrapper that records issued statements and injects failures.

use async_trait::async_trait;
use sl_gateway::{
    ColumnInfo, Gateway, GatewayError, GatewayResult, IndexColumn, IndexEntry, QueryMode,
    QueryResult, SqlValue, TableSchema,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// A statement that reached [`RecordingGateway::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub mode: QueryMode,
}

impl IssuedQuery {
    pub fn is_write(&self) -> bool {
        self.mode != QueryMode::Read
    }
}

#[derive(Debug, Default)]
struct Faults {
    next_write: Option<String>,
    next_read: Option<String>,
    delay: Option<Duration>,
}

/// Wraps a real gateway, keeping a log of every query it forwards.
pub struct RecordingGateway<G> {
    inner: G,
    log: Mutex<Vec<IssuedQuery>>,
    faults: Mutex<Faults>,
    external_change: AtomicBool,
}

impl<G: Gateway> RecordingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            external_change: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Every query issued so far, oldest first.
    pub fn queries(&self) -> Vec<IssuedQuery> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Queries issued in write or script mode.
    pub fn writes(&self) -> Vec<IssuedQuery> {
        self.queries().into_iter().filter(IssuedQuery::is_write).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.log.lock() {
            log.clear();
        }
    }

    /// Fail the next write with `message` without forwarding it.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.next_write = Some(message.into());
        }
    }

    /// Fail the next read-mode query with `message` without forwarding it.
    pub fn fail_next_read(&self, message: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.next_read = Some(message.into());
        }
    }

    /// Sleep for `delay` (tokio time) before answering each query.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.delay = delay;
        }
    }

    /// Report an external change on the next poll.
    pub fn set_external_change(&self, changed: bool) {
        self.external_change.store(changed, Ordering::SeqCst);
    }

    fn take_fault(&self, mode: QueryMode) -> (Option<String>, Option<Duration>) {
        let Ok(mut faults) = self.faults.lock() else {
            return (None, None);
        };
        let fault = match mode {
            QueryMode::Read => faults.next_read.take(),
            QueryMode::ReadWrite | QueryMode::Script => faults.next_write.take(),
        };
        (fault, faults.delay)
    }
}

#[async_trait]
impl<G: Gateway> Gateway for RecordingGateway<G> {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> GatewayResult<QueryResult> {
        if let Ok(mut log) = self.log.lock() {
            log.push(IssuedQuery {
                sql: sql.to_owned(),
                params: params.to_vec(),
                mode,
            });
        }

        let (fault, delay) = self.take_fault(mode);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = fault {
            debug!(sql, "injected failure");
            return Err(GatewayError::query(message, sql, params));
        }
        self.inner.query(sql, params, mode).await
    }

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>> {
        self.inner.table_list().await
    }

    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        self.inner.table_info(table).await
    }

    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>> {
        self.inner.index_list(table).await
    }

    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>> {
        self.inner.index_info(index).await
    }

    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>> {
        self.inner.table_schema(table).await
    }

    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>> {
        self.inner.index_schema(index).await
    }

    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool> {
        self.inner.has_table_autoincrement_column(table).await
    }

    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>> {
        self.inner.import(path).await
    }

    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()> {
        self.inner.export(path, bytes).await
    }

    async fn external_change_detected(&self) -> GatewayResult<bool> {
        let forced = self.external_change.swap(false, Ordering::SeqCst);
        let real = self.inner.external_change_detected().await?;
        Ok(forced || real)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_sqlite::Database;

    #[tokio::test]
    async fn test_records_and_fails_writes() {
        let gateway = RecordingGateway::new(Database::open_in_memory().unwrap());
        gateway
            .query("CREATE TABLE t (x)", &[], QueryMode::ReadWrite)
            .await
            .unwrap();

        gateway.fail_next_write("disk full");
        let err = gateway
            .query("INSERT INTO t VALUES (?)", &[SqlValue::Integer(1)], QueryMode::ReadWrite)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));

        let rows = gateway
            .query("SELECT COUNT(*) FROM t", &[], QueryMode::Read)
            .await
            .unwrap();
        assert_eq!(rows.scalar(), Some(&SqlValue::Integer(0)));
        assert_eq!(gateway.writes().len(), 2);
        assert_eq!(gateway.queries().len(), 3);
    }

    #[tokio::test]
    async fn test_forced_external_change_fires_once() {
        let gateway = RecordingGateway::new(Database::open_in_memory().unwrap());
        gateway.set_external_change(true);
        assert!(gateway.external_change_detected().await.unwrap());
        assert!(!gateway.external_change_detected().await.unwrap());
    }
}
