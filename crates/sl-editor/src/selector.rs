//! Row selectors for UPDATE and DELETE.

use crate::statement::quote_ident;
use sl_gateway::{Record, SqlValue};

/// Primary key or unique index usable to address a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub is_primary: bool,
    pub columns: Vec<String>,
}

/// WHERE clause that identifies exactly one row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelector {
    RowId(i64),
    Columns {
        is_primary: bool,
        values: Vec<(String, SqlValue)>,
    },
}

impl RowSelector {
    /// Build the selector for `constraint` against `record`, or `None` when a
    /// column is missing or NULL (NULL never compares equal).
    pub fn from_constraint(constraint: &UniqueConstraint, record: &Record) -> Option<Self> {
        let mut values = Vec::with_capacity(constraint.columns.len());
        for column in &constraint.columns {
            match record.get(column) {
                Some(value) if !value.is_null() => values.push((column.clone(), value.clone())),
                _ => return None,
            }
        }
        if values.is_empty() {
            return None;
        }
        Some(RowSelector::Columns {
            is_primary: constraint.is_primary,
            values,
        })
    }

    /// `rowid = ?` or `"a" = ? AND "b" = ?` with its parameters.
    pub fn where_clause(&self) -> (String, Vec<SqlValue>) {
        match self {
            RowSelector::RowId(rowid) => ("rowid = ?".to_owned(), vec![SqlValue::Integer(*rowid)]),
            RowSelector::Columns { values, .. } => {
                let clause = values
                    .iter()
                    .map(|(column, _)| format!("{} = ?", quote_ident(column)))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let params = values.iter().map(|(_, value)| value.clone()).collect();
                (clause, params)
            }
        }
    }

    /// Whether `record` satisfies the selector.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RowSelector::RowId(rowid) => record.rowid() == Some(*rowid),
            RowSelector::Columns { values, .. } => values
                .iter()
                .all(|(column, value)| record.get(column) == Some(value)),
        }
    }

    /// Short label for selector pickers, e.g. `rowid` or `(a, b)`.
    pub fn label(&self) -> String {
        match self {
            RowSelector::RowId(_) => "rowid".to_owned(),
            RowSelector::Columns { values, .. } => format!(
                "({})",
                values
                    .iter()
                    .map(|(column, _)| column.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// Candidate selectors for `record`: the rowid first when present, then every
/// usable constraint in the given order.
pub fn candidate_selectors(record: &Record, constraints: &[UniqueConstraint]) -> Vec<RowSelector> {
    let mut selectors = Vec::new();
    if let Some(rowid) = record.rowid() {
        selectors.push(RowSelector::RowId(rowid));
    }
    selectors.extend(
        constraints
            .iter()
            .filter_map(|constraint| RowSelector::from_constraint(constraint, record)),
    );
    selectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_gateway::ROWID_COLUMN;

    fn record(values: &[(&str, SqlValue)]) -> Record {
        values.iter().cloned().collect()
    }

    #[test]
    fn test_rowid_comes_first() {
        let r = record(&[
            (ROWID_COLUMN, SqlValue::Integer(3)),
            ("id", SqlValue::Integer(3)),
        ]);
        let constraints = vec![UniqueConstraint {
            is_primary: true,
            columns: vec!["id".into()],
        }];
        let selectors = candidate_selectors(&r, &constraints);
        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[0], RowSelector::RowId(3));
        assert_eq!(selectors[1].label(), "(id)");
    }

    #[test]
    fn test_null_column_disqualifies_constraint() {
        let r = record(&[("a", SqlValue::Integer(1)), ("b", SqlValue::Null)]);
        let constraints = vec![
            UniqueConstraint {
                is_primary: false,
                columns: vec!["a".into(), "b".into()],
            },
            UniqueConstraint {
                is_primary: false,
                columns: vec!["a".into()],
            },
        ];
        let selectors = candidate_selectors(&r, &constraints);
        assert_eq!(selectors.len(), 1);
        assert!(selectors[0].matches(&r));
    }

    #[test]
    fn test_where_clause_quotes_columns() {
        let selector = RowSelector::Columns {
            is_primary: true,
            values: vec![
                ("a\"b".into(), SqlValue::Integer(1)),
                ("c".into(), SqlValue::Text("x".into())),
            ],
        };
        let (clause, params) = selector.where_clause();
        assert_eq!(clause, r#""a""b" = ? AND "c" = ?"#);
        assert_eq!(params.len(), 2);
    }
}
