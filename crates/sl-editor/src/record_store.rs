//! Fetched page of records plus the schema of the selected table.

use crate::find::FilterPredicate;
use crate::paging::Paging;
use crate::selector::UniqueConstraint;
use crate::statement::quote_ident;
use crate::store::Store;
use sl_gateway::{
    ColumnInfo, Gateway, GatewayResult, IndexColumn, IndexEntry, IndexOrigin, QueryMode, Record,
    SqlValue, TableSchema, ROWID_COLUMN,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDetail {
    pub entry: IndexEntry,
    pub columns: Vec<IndexColumn>,
    pub ddl: Option<String>,
}

/// Schema of one table, replaced as a whole on every schema reload.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub table: TableSchema,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexDetail>,
    pub autoincrement: bool,
    pub ddl: Option<String>,
}

impl TableSnapshot {
    pub async fn fetch<G: Gateway + ?Sized>(gateway: &G, table: &TableSchema) -> GatewayResult<Self> {
        let columns = gateway.table_info(&table.name).await?;

        let mut indexes = Vec::new();
        for entry in gateway.index_list(&table.name).await? {
            let index_columns = gateway.index_info(&entry.name).await?;
            let ddl = gateway.index_schema(&entry.name).await?;
            indexes.push(IndexDetail {
                entry,
                columns: index_columns,
                ddl,
            });
        }

        let autoincrement = gateway.has_table_autoincrement_column(&table.name).await?;
        let ddl = gateway.table_schema(&table.name).await?;

        debug!(
            table = %table.name,
            columns = columns.len(),
            indexes = indexes.len(),
            "fetched table schema"
        );
        Ok(Self {
            table: table.clone(),
            columns,
            indexes,
            autoincrement,
            ddl,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Primary key first, then every non-partial unique index whose columns
    /// are all plain columns. Duplicates by column set are dropped.
    pub fn unique_constraints(&self) -> Vec<UniqueConstraint> {
        let mut constraints = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();

        let primary: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        if !primary.is_empty() {
            seen.insert(sorted(&primary));
            constraints.push(UniqueConstraint {
                is_primary: true,
                columns: primary,
            });
        }

        for index in &self.indexes {
            if !index.entry.unique || index.entry.partial {
                continue;
            }
            let columns: Option<Vec<String>> =
                index.columns.iter().map(|c| c.name.clone()).collect();
            let Some(columns) = columns else {
                continue;
            };
            if columns.is_empty() || !seen.insert(sorted(&columns)) {
                continue;
            }
            constraints.push(UniqueConstraint {
                is_primary: index.entry.origin == IndexOrigin::PrimaryKey,
                columns,
            });
        }

        constraints.sort_by_key(|c| !c.is_primary);
        constraints
    }

    fn source(&self, filter: Option<&FilterPredicate>) -> (String, Vec<SqlValue>) {
        let mut sql = format!("FROM {}", quote_ident(&self.table.name));
        let mut params = Vec::new();
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
            params.extend(filter.params.iter().cloned());
        }
        (sql, params)
    }

    /// `SELECT [rowid AS "__rowid__", ]cols FROM t [WHERE filter] LIMIT ? OFFSET ?`
    pub fn page_query(
        &self,
        filter: Option<&FilterPredicate>,
        paging: &Paging,
    ) -> (String, Vec<SqlValue>) {
        let mut columns: Vec<String> = Vec::new();
        if self.table.has_rowid() {
            columns.push(format!("rowid AS {}", quote_ident(ROWID_COLUMN)));
        }
        columns.extend(self.columns.iter().map(|c| quote_ident(&c.name)));
        if columns.is_empty() {
            columns.push("*".to_owned());
        }

        let (source, mut params) = self.source(filter);
        params.push(SqlValue::Integer(paging.visible_area_size as i64));
        params.push(SqlValue::Integer(paging.visible_area_top as i64));
        (
            format!("SELECT {} {} LIMIT ? OFFSET ?", columns.join(", "), source),
            params,
        )
    }

    /// `SELECT cols FROM t [WHERE filter]` without paging or the rowid column.
    pub fn rows_query(&self, filter: Option<&FilterPredicate>) -> (String, Vec<SqlValue>) {
        let mut columns: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        if columns.is_empty() {
            columns.push("*".to_owned());
        }
        let (source, params) = self.source(filter);
        (format!("SELECT {} {}", columns.join(", "), source), params)
    }

    pub fn count_query(&self, filter: Option<&FilterPredicate>) -> (String, Vec<SqlValue>) {
        let (source, params) = self.source(filter);
        (format!("SELECT COUNT(*) {}", source), params)
    }
}

fn sorted(columns: &[String]) -> Vec<String> {
    let mut columns = columns.to_vec();
    columns.sort();
    columns
}

/// The records currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    /// Absolute index of `records[0]`.
    pub top: u64,
    pub records: Vec<Record>,
    /// Fetch that produced this page.
    pub token: u64,
}

impl RecordPage {
    pub fn record_at(&self, row: u64) -> Option<&Record> {
        let offset = row.checked_sub(self.top)?;
        self.records.get(usize::try_from(offset).ok()?)
    }
}

/// Holds the schema snapshot and the page, dropping page responses older
/// than the newest one already applied.
#[derive(Debug, Clone)]
pub struct RecordStore {
    snapshot: Store<Option<Arc<TableSnapshot>>>,
    page: Store<Arc<RecordPage>>,
    next_token: u64,
    applied_token: u64,
}

impl RecordStore {
    pub fn new(snapshot: Store<Option<Arc<TableSnapshot>>>, page: Store<Arc<RecordPage>>) -> Self {
        Self {
            snapshot,
            page,
            next_token: 0,
            applied_token: 0,
        }
    }

    pub fn snapshot(&self) -> Option<Arc<TableSnapshot>> {
        self.snapshot.get()
    }

    pub fn set_snapshot(&self, snapshot: Option<Arc<TableSnapshot>>) {
        self.snapshot.set(snapshot);
    }

    pub fn page(&self) -> Arc<RecordPage> {
        self.page.get()
    }

    /// Token for a page fetch about to be issued.
    pub fn begin_fetch(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Publish a fetched page unless a newer one has already been applied.
    pub fn apply_page(&mut self, token: u64, top: u64, records: Vec<Record>) -> bool {
        if token < self.applied_token {
            warn!(token, applied = self.applied_token, "dropping stale page response");
            return false;
        }
        self.applied_token = token;
        self.page.set(Arc::new(RecordPage {
            top,
            records,
            token,
        }));
        true
    }

    pub fn clear(&mut self) {
        self.snapshot.set(None);
        self.page.set(Arc::new(RecordPage::default()));
    }

    pub async fn fetch_count<G: Gateway + ?Sized>(
        gateway: &G,
        snapshot: &TableSnapshot,
        filter: Option<&FilterPredicate>,
    ) -> GatewayResult<u64> {
        let (sql, params) = snapshot.count_query(filter);
        let result = gateway.query(&sql, &params, QueryMode::Read).await?;
        Ok(match result.scalar() {
            Some(SqlValue::Integer(count)) => (*count).max(0) as u64,
            _ => 0,
        })
    }

    pub async fn fetch_records<G: Gateway + ?Sized>(
        gateway: &G,
        snapshot: &TableSnapshot,
        filter: Option<&FilterPredicate>,
        paging: &Paging,
    ) -> GatewayResult<Vec<Record>> {
        let (sql, params) = snapshot.page_query(filter, paging);
        Ok(gateway.query(&sql, &params, QueryMode::Read).await?.records)
    }
}
