//! Schema introspection results.

use serde::{Deserialize, Serialize};

/// Kind of entry reported by `pragma_table_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Table,
    View,
    Shadow,
    Virtual,
    Other,
}

impl From<&str> for TableKind {
    fn from(value: &str) -> Self {
        match value {
            "table" => Self::Table,
            "view" => Self::View,
            "shadow" => Self::Shadow,
            "virtual" => Self::Virtual,
            _ => Self::Other,
        }
    }
}

/// A table or view in the database. Replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub kind: TableKind,
    pub without_rowid: bool,
    pub strict: bool,
}

impl TableSchema {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Table,
            without_rowid: false,
            strict: false,
        }
    }

    /// Whether fetched records carry a synthetic rowid column.
    pub fn has_rowid(&self) -> bool {
        self.kind == TableKind::Table && !self.without_rowid
    }
}

/// One column as reported by `pragma_table_xinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub ordinal: i64,
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    /// Generated or virtual-table hidden column.
    pub hidden: bool,
}

/// Where an index came from (`pragma_index_list.origin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOrigin {
    /// `CREATE INDEX`
    #[serde(rename = "c")]
    CreateIndex,
    /// `UNIQUE` constraint
    #[serde(rename = "u")]
    Unique,
    /// `PRIMARY KEY` constraint
    #[serde(rename = "pk")]
    PrimaryKey,
}

impl From<&str> for IndexOrigin {
    fn from(value: &str) -> Self {
        match value {
            "u" => Self::Unique,
            "pk" => Self::PrimaryKey,
            _ => Self::CreateIndex,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub unique: bool,
    pub origin: IndexOrigin,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub seqno: i64,
    pub cid: i64,
    /// `None` for expression columns.
    pub name: Option<String>,
}
