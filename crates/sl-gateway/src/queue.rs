//! Request/response queue in front of a single connection.
//!
//! Every request gets an explicit [`RequestId`] and is answered through its own
//! oneshot channel. A single worker task owns the inner gateway and processes
//! requests strictly in arrival order, so callers never depend on the
//! ordering of a shared pipe.

use crate::error::{GatewayError, GatewayResult};
use crate::schema::{ColumnInfo, IndexColumn, IndexEntry, TableSchema};
use crate::value::{QueryMode, QueryResult, SqlValue};
use crate::Gateway;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identifier attached to every queued request.
pub type RequestId = u64;

enum Request {
    Query {
        sql: String,
        params: Vec<SqlValue>,
        mode: QueryMode,
    },
    TableList,
    TableInfo(String),
    IndexList(String),
    IndexInfo(String),
    TableSchema(String),
    IndexSchema(String),
    Autoincrement(String),
    Import(PathBuf),
    Export(PathBuf, Vec<u8>),
    ExternalChange,
}

impl Request {
    fn label(&self) -> &'static str {
        match self {
            Request::Query { .. } => "query",
            Request::TableList => "table_list",
            Request::TableInfo(_) => "table_info",
            Request::IndexList(_) => "index_list",
            Request::IndexInfo(_) => "index_info",
            Request::TableSchema(_) => "table_schema",
            Request::IndexSchema(_) => "index_schema",
            Request::Autoincrement(_) => "has_table_autoincrement_column",
            Request::Import(_) => "import",
            Request::Export(..) => "export",
            Request::ExternalChange => "external_change_detected",
        }
    }
}

#[derive(Debug)]
enum Response {
    Rows(QueryResult),
    Tables(Vec<TableSchema>),
    Columns(Vec<ColumnInfo>),
    Indexes(Vec<IndexEntry>),
    IndexColumns(Vec<IndexColumn>),
    Sql(Option<String>),
    Flag(bool),
    Bytes(Vec<u8>),
    Done,
}

struct Envelope {
    id: RequestId,
    request: Request,
    reply: oneshot::Sender<Reply>,
}

struct Reply {
    id: RequestId,
    result: GatewayResult<Response>,
}

/// Gateway that forwards every call through a single in-flight queue.
pub struct QueuedGateway {
    sender: mpsc::UnboundedSender<Envelope>,
    next_id: AtomicU64,
    cancellation_token: CancellationToken,
}

impl QueuedGateway {
    /// Spawn the worker task on the current tokio runtime.
    pub fn spawn(inner: Arc<dyn Gateway>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();

        tokio::spawn(Self::worker(inner, receiver, cancellation_token.clone()));

        Self {
            sender,
            next_id: AtomicU64::new(0),
            cancellation_token,
        }
    }

    /// Stop the worker. Pending and later calls fail with [`GatewayError::Closed`].
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    /// Id of the most recently issued request (0 before the first one).
    pub fn last_request_id(&self) -> RequestId {
        self.next_id.load(Ordering::SeqCst)
    }

    async fn worker(
        inner: Arc<dyn Gateway>,
        mut receiver: mpsc::UnboundedReceiver<Envelope>,
        cancellation_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    break;
                }
                envelope = receiver.recv() => {
                    let Some(Envelope { id, request, reply }) = envelope else {
                        break;
                    };
                    debug!(id, request = request.label(), "dispatching gateway request");
                    let result = Self::dispatch(inner.as_ref(), request).await;
                    if reply.send(Reply { id, result }).is_err() {
                        debug!(id, "requester went away before the reply");
                    }
                }
            }
        }
        debug!("gateway queue worker stopped");
    }

    async fn dispatch(inner: &dyn Gateway, request: Request) -> GatewayResult<Response> {
        Ok(match request {
            Request::Query { sql, params, mode } => {
                Response::Rows(inner.query(&sql, &params, mode).await?)
            }
            Request::TableList => Response::Tables(inner.table_list().await?),
            Request::TableInfo(table) => Response::Columns(inner.table_info(&table).await?),
            Request::IndexList(table) => Response::Indexes(inner.index_list(&table).await?),
            Request::IndexInfo(index) => Response::IndexColumns(inner.index_info(&index).await?),
            Request::TableSchema(table) => Response::Sql(inner.table_schema(&table).await?),
            Request::IndexSchema(index) => Response::Sql(inner.index_schema(&index).await?),
            Request::Autoincrement(table) => {
                Response::Flag(inner.has_table_autoincrement_column(&table).await?)
            }
            Request::Import(path) => Response::Bytes(inner.import(&path).await?),
            Request::Export(path, bytes) => {
                inner.export(&path, &bytes).await?;
                Response::Done
            }
            Request::ExternalChange => Response::Flag(inner.external_change_detected().await?),
        })
    }

    async fn call(&self, request: Request) -> GatewayResult<Response> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply, response) = oneshot::channel();

        self.sender
            .send(Envelope { id, request, reply })
            .map_err(|_| GatewayError::Closed)?;

        let reply = response.await.map_err(|_| GatewayError::Closed)?;
        if reply.id != id {
            warn!(expected = id, actual = reply.id, "reply routed to the wrong request");
            return Err(GatewayError::unexpected(format!(
                "reply {} does not answer request {}",
                reply.id, id
            )));
        }
        reply.result
    }
}

impl Drop for QueuedGateway {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

fn mismatch<T>(response: Response) -> GatewayResult<T> {
    Err(GatewayError::unexpected(format!(
        "mismatched gateway response: {:?}",
        response
    )))
}

#[async_trait]
impl Gateway for QueuedGateway {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> GatewayResult<QueryResult> {
        let request = Request::Query {
            sql: sql.to_owned(),
            params: params.to_vec(),
            mode,
        };
        match self.call(request).await? {
            Response::Rows(rows) => Ok(rows),
            other => mismatch(other),
        }
    }

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>> {
        match self.call(Request::TableList).await? {
            Response::Tables(tables) => Ok(tables),
            other => mismatch(other),
        }
    }

    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        match self.call(Request::TableInfo(table.to_owned())).await? {
            Response::Columns(columns) => Ok(columns),
            other => mismatch(other),
        }
    }

    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>> {
        match self.call(Request::IndexList(table.to_owned())).await? {
            Response::Indexes(indexes) => Ok(indexes),
            other => mismatch(other),
        }
    }

    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>> {
        match self.call(Request::IndexInfo(index.to_owned())).await? {
            Response::IndexColumns(columns) => Ok(columns),
            other => mismatch(other),
        }
    }

    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>> {
        match self.call(Request::TableSchema(table.to_owned())).await? {
            Response::Sql(sql) => Ok(sql),
            other => mismatch(other),
        }
    }

    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>> {
        match self.call(Request::IndexSchema(index.to_owned())).await? {
            Response::Sql(sql) => Ok(sql),
            other => mismatch(other),
        }
    }

    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool> {
        match self.call(Request::Autoincrement(table.to_owned())).await? {
            Response::Flag(flag) => Ok(flag),
            other => mismatch(other),
        }
    }

    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>> {
        match self.call(Request::Import(path.to_path_buf())).await? {
            Response::Bytes(bytes) => Ok(bytes),
            other => mismatch(other),
        }
    }

    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()> {
        match self
            .call(Request::Export(path.to_path_buf(), bytes.to_vec()))
            .await?
        {
            Response::Done => Ok(()),
            other => mismatch(other),
        }
    }

    async fn external_change_detected(&self) -> GatewayResult<bool> {
        match self.call(Request::ExternalChange).await? {
            Response::Flag(flag) => Ok(flag),
            other => mismatch(other),
        }
    }
}
