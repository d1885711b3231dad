//! SQL values and fetched records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the synthetic column that carries the rowid of a fetched record.
pub const ROWID_COLUMN: &str = "__rowid__";

/// A single SQL value as bound to or read from a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Null,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Real(v) => write!(f, "{}", v),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Blob(bytes) => {
                f.write_str("x'")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_str("'")
            }
            SqlValue::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Query access mode requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryMode {
    /// Read-only; statements that write are rejected.
    #[serde(rename = "r")]
    Read,
    /// Single statement that may write.
    #[serde(rename = "w+")]
    ReadWrite,
    /// Multi-statement batch without parameters.
    #[serde(rename = "script")]
    Script,
}

/// One fetched row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(HashMap<String, SqlValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: SqlValue) {
        self.0.insert(column.into(), value);
    }

    /// The synthetic rowid, if the record was fetched from a rowid table.
    pub fn rowid(&self) -> Option<i64> {
        match self.0.get(ROWID_COLUMN) {
            Some(SqlValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SqlValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Rows returned by a query together with their column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// First column of the first row, used for scalar queries like `COUNT(*)`.
    pub fn scalar(&self) -> Option<&SqlValue> {
        let column = self.columns.first()?;
        self.records.first()?.get(column)
    }
}
