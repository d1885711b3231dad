//! Global "querying" indicator, shown once a request has been outstanding
//! for longer than a short delay.

use async_trait::async_trait;
use sl_gateway::{
    ColumnInfo, Gateway, GatewayResult, IndexColumn, IndexEntry, QueryMode, QueryResult, SqlValue,
    TableSchema,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct QueryingIndicator {
    delay: Duration,
    next_id: AtomicU64,
    outstanding: Mutex<BTreeMap<u64, Instant>>,
}

/// Marks one request as outstanding until dropped.
pub struct RequestGuard {
    indicator: Arc<QueryingIndicator>,
    id: u64,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if let Ok(mut outstanding) = self.indicator.outstanding.lock() {
            outstanding.remove(&self.id);
        }
    }
}

impl QueryingIndicator {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            next_id: AtomicU64::new(0),
            outstanding: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn begin(self: &Arc<Self>) -> RequestGuard {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut outstanding) = self.outstanding.lock() {
            outstanding.insert(id, Instant::now());
        }
        RequestGuard {
            indicator: Arc::clone(self),
            id,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().map(|o| o.len()).unwrap_or(0)
    }

    /// True when the oldest outstanding request has waited at least `delay`.
    pub fn is_visible(&self) -> bool {
        let Ok(outstanding) = self.outstanding.lock() else {
            return false;
        };
        outstanding
            .values()
            .any(|started| started.elapsed() >= self.delay)
    }
}

/// Gateway wrapper that reports every call to a [`QueryingIndicator`].
pub struct TrackedGateway<G> {
    inner: Arc<G>,
    indicator: Arc<QueryingIndicator>,
}

impl<G: Gateway> TrackedGateway<G> {
    pub fn new(inner: Arc<G>, indicator: Arc<QueryingIndicator>) -> Self {
        Self { inner, indicator }
    }

    pub fn inner(&self) -> &Arc<G> {
        &self.inner
    }

    async fn track<T>(&self, call: impl Future<Output = T>) -> T {
        let _guard = self.indicator.begin();
        call.await
    }
}

#[async_trait]
impl<G: Gateway> Gateway for TrackedGateway<G> {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> GatewayResult<QueryResult> {
        self.track(self.inner.query(sql, params, mode)).await
    }

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>> {
        self.track(self.inner.table_list()).await
    }

    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        self.track(self.inner.table_info(table)).await
    }

    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>> {
        self.track(self.inner.index_list(table)).await
    }

    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>> {
        self.track(self.inner.index_info(index)).await
    }

    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>> {
        self.track(self.inner.table_schema(table)).await
    }

    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>> {
        self.track(self.inner.index_schema(index)).await
    }

    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool> {
        self.track(self.inner.has_table_autoincrement_column(table))
            .await
    }

    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>> {
        self.track(self.inner.import(path)).await
    }

    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()> {
        self.track(self.inner.export(path, bytes)).await
    }

    async fn external_change_detected(&self) -> GatewayResult<bool> {
        self.inner.external_change_detected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_indicator_waits_for_delay() {
        let indicator = QueryingIndicator::new(Duration::from_secs(1));
        let guard = indicator.begin();
        assert!(!indicator.is_visible());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!indicator.is_visible());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(indicator.is_visible());

        drop(guard);
        assert!(!indicator.is_visible());
        assert_eq!(indicator.outstanding(), 0);
    }
}
