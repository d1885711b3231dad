//! [`Gateway`] implementation over a rusqlite connection.

use crate::connection::Database;
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use sl_gateway::{
    ColumnInfo, Gateway, GatewayError, GatewayResult, IndexColumn, IndexEntry, IndexOrigin,
    QueryMode, QueryResult, Record, SqlValue, TableKind, TableSchema,
};
use std::path::Path;
use tracing::debug;

/// Binds a [`SqlValue`] as a statement parameter.
struct Param<'a>(&'a SqlValue);

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            SqlValue::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            SqlValue::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
        })
    }
}

fn to_sql_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Real(v),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}

/// Run one statement and collect every row it yields.
fn run_statement(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
    mode: QueryMode,
) -> GatewayResult<QueryResult> {
    let query_error = |e: rusqlite::Error| GatewayError::query(e.to_string(), sql, params);

    let mut stmt = conn.prepare(sql).map_err(query_error)?;
    if mode == QueryMode::Read && !stmt.readonly() {
        return Err(GatewayError::ReadOnly {
            sql: sql.to_owned(),
        });
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt
        .query(params_from_iter(params.iter().map(Param)))
        .map_err(query_error)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(query_error)? {
        let mut record = Record::new();
        for (i, column) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(query_error)?;
            record.insert(column.clone(), to_sql_value(value));
        }
        records.push(record);
    }

    Ok(QueryResult { columns, records })
}

impl Database {
    /// Run synchronous connection work on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> GatewayResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> GatewayResult<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(|e| GatewayError::unexpected(format!("database task failed: {}", e)))?
    }

    fn select<T>(
        &self,
        sql: &str,
        params: &[SqlValue],
        map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> GatewayResult<Vec<T>> {
        let query_error = |e: rusqlite::Error| GatewayError::query(e.to_string(), sql, params);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter().map(Param)), map)
            .map_err(query_error)?;
        let collected = rows.collect::<rusqlite::Result<Vec<T>>>().map_err(query_error)?;
        Ok(collected)
    }

    fn schema_sql(&self, kind: &str, name: &str) -> GatewayResult<Option<String>> {
        let sql = "SELECT sql FROM sqlite_schema WHERE type = ? AND name = ?";
        let params = [SqlValue::from(kind), SqlValue::from(name)];
        let conn = self.lock()?;
        let found: Option<Option<String>> = conn
            .query_row(sql, params_from_iter(params.iter().map(Param)), |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| GatewayError::query(e.to_string(), sql, &params))?;
        Ok(found.flatten())
    }
}

#[async_trait]
impl Gateway for Database {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: QueryMode,
    ) -> GatewayResult<QueryResult> {
        debug!(sql, params = params.len(), ?mode, "query");
        let sql = sql.to_owned();
        let params = params.to_vec();
        self.blocking(move |db| {
            let conn = db.lock()?;
            if mode == QueryMode::Script {
                if !params.is_empty() {
                    return Err(GatewayError::query(
                        "script mode does not accept parameters",
                        &sql,
                        &params,
                    ));
                }
                conn.execute_batch(&sql)
                    .map_err(|e| GatewayError::query(e.to_string(), &sql, &params))?;
                return Ok(QueryResult::empty());
            }
            run_statement(&conn, &sql, &params, mode)
        })
        .await
    }

    async fn table_list(&self) -> GatewayResult<Vec<TableSchema>> {
        self.blocking(|db| {
            db.select(
                r#"
                SELECT name, type, wr, strict FROM pragma_table_list
                WHERE schema = 'main' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
                ORDER BY name
                "#,
                &[],
                |row| {
                    let kind: String = row.get(1)?;
                    Ok(TableSchema {
                        name: row.get(0)?,
                        kind: TableKind::from(kind.as_str()),
                        without_rowid: row.get(2)?,
                        strict: row.get(3)?,
                    })
                },
            )
        })
        .await
    }

    async fn table_info(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
        let params = [SqlValue::from(table)];
        self.blocking(move |db| {
            db.select(
                r#"
                SELECT cid, name, type, "notnull", dflt_value, pk, hidden
                FROM pragma_table_xinfo(?) ORDER BY cid
                "#,
                &params,
                |row| {
                    Ok(ColumnInfo {
                        ordinal: row.get(0)?,
                        name: row.get(1)?,
                        declared_type: row.get(2)?,
                        not_null: row.get(3)?,
                        default_value: row.get(4)?,
                        is_primary_key: row.get::<_, i64>(5)? > 0,
                        hidden: row.get::<_, i64>(6)? != 0,
                    })
                },
            )
        })
        .await
    }

    async fn index_list(&self, table: &str) -> GatewayResult<Vec<IndexEntry>> {
        let params = [SqlValue::from(table)];
        self.blocking(move |db| {
            db.select(
                r#"SELECT name, "unique", origin, partial FROM pragma_index_list(?)"#,
                &params,
                |row| {
                    let origin: String = row.get(2)?;
                    Ok(IndexEntry {
                        name: row.get(0)?,
                        unique: row.get(1)?,
                        origin: IndexOrigin::from(origin.as_str()),
                        partial: row.get(3)?,
                    })
                },
            )
        })
        .await
    }

    async fn index_info(&self, index: &str) -> GatewayResult<Vec<IndexColumn>> {
        let params = [SqlValue::from(index)];
        self.blocking(move |db| {
            db.select(
                "SELECT seqno, cid, name FROM pragma_index_info(?) ORDER BY seqno",
                &params,
                |row| {
                    Ok(IndexColumn {
                        seqno: row.get(0)?,
                        cid: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
        })
        .await
    }

    async fn table_schema(&self, table: &str) -> GatewayResult<Option<String>> {
        let table = table.to_owned();
        self.blocking(move |db| match db.schema_sql("table", &table)? {
            Some(sql) => Ok(Some(sql)),
            None => db.schema_sql("view", &table),
        })
        .await
    }

    async fn index_schema(&self, index: &str) -> GatewayResult<Option<String>> {
        let index = index.to_owned();
        self.blocking(move |db| db.schema_sql("index", &index)).await
    }

    async fn has_table_autoincrement_column(&self, table: &str) -> GatewayResult<bool> {
        let params = [SqlValue::from(table)];
        self.blocking(move |db| {
            // An empty AUTOINCREMENT table has no sqlite_sequence row yet.
            let sequence = db.select(
                "SELECT 1 FROM sqlite_schema WHERE type = 'table' AND name = 'sqlite_sequence'",
                &[],
                |_| Ok(()),
            )?;
            if sequence.is_empty() {
                return Ok(false);
            }
            let rows = db.select(
                "SELECT 1 FROM sqlite_sequence WHERE name = ? COLLATE NOCASE",
                &params,
                |_| Ok(()),
            )?;
            Ok(!rows.is_empty())
        })
        .await
    }

    async fn import(&self, path: &Path) -> GatewayResult<Vec<u8>> {
        debug!(?path, "importing blob");
        Ok(tokio::fs::read(path).await?)
    }

    async fn export(&self, path: &Path, bytes: &[u8]) -> GatewayResult<()> {
        debug!(?path, len = bytes.len(), "exporting blob");
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn external_change_detected(&self) -> GatewayResult<bool> {
        self.blocking(|db| db.poll_data_version()).await
    }
}
