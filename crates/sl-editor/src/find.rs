//! Find-widget state and the filter predicate derived from it.

use crate::statement::quote_ident;
use serde::{Deserialize, Serialize};
use sl_gateway::{FindMode, SqlValue};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindWidgetState {
    pub value: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub regex: bool,
}

/// Partial change to the find widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindWidgetUpdate {
    pub value: Option<String>,
    pub case_sensitive: Option<bool>,
    pub whole_word: Option<bool>,
    pub regex: Option<bool>,
}

impl FindWidgetUpdate {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// SQL fragment for a WHERE clause with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl FindWidgetState {
    pub fn merged(&self, update: &FindWidgetUpdate) -> Self {
        Self {
            value: update.value.clone().unwrap_or_else(|| self.value.clone()),
            case_sensitive: update.case_sensitive.unwrap_or(self.case_sensitive),
            whole_word: update.whole_word.unwrap_or(self.whole_word),
            regex: update.regex.unwrap_or(self.regex),
        }
    }

    /// An empty search term filters nothing.
    pub fn is_active(&self) -> bool {
        !self.value.is_empty()
    }

    pub fn mode(&self) -> FindMode {
        FindMode {
            regex: self.regex,
            whole_word: self.whole_word,
            case_sensitive: self.case_sensitive,
        }
    }

    /// `(f("c1", ?) OR f("c2", ?) ...)`, one parameter per column.
    pub fn predicate(&self, columns: &[String]) -> Option<FilterPredicate> {
        if !self.is_active() || columns.is_empty() {
            return None;
        }
        let function = self.mode().function_name();
        let sql = columns
            .iter()
            .map(|column| format!("{}({}, ?)", function, quote_ident(column)))
            .collect::<Vec<_>>()
            .join(" OR ");
        Some(FilterPredicate {
            sql: format!("({})", sql),
            params: vec![SqlValue::Text(self.value.clone()); columns.len()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_state_has_no_predicate() {
        let state = FindWidgetState::default();
        assert!(state.predicate(&["a".into()]).is_none());
    }

    #[test]
    fn test_predicate_ors_every_column() {
        let state = FindWidgetState::default().merged(&FindWidgetUpdate {
            value: Some("x".into()),
            regex: Some(true),
            case_sensitive: Some(true),
            ..Default::default()
        });
        let predicate = state.predicate(&["a".into(), "b".into()]).unwrap();
        assert_eq!(
            predicate.sql,
            r#"(find_widget_compare_r_c("a", ?) OR find_widget_compare_r_c("b", ?))"#
        );
        assert_eq!(predicate.params, vec![SqlValue::from("x"), SqlValue::from("x")]);
    }
}
