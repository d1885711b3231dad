//! Scalar functions used by find-widget predicates.

use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use sl_gateway::{FindMode, RegexCache};
use std::borrow::Cow;
use std::sync::Arc;

/// Register `find_widget_compare[_r][_w][_c](cell, needle)` on `conn`.
pub fn register_find_functions(conn: &Connection, cache: Arc<RegexCache>) -> crate::Result<()> {
    for mode in FindMode::all() {
        let cache = Arc::clone(&cache);
        conn.create_scalar_function(
            mode.function_name(),
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            move |ctx| {
                let haystack = cell_text(ctx.get_raw(0));
                let needle = cell_text(ctx.get_raw(1));
                Ok(mode.matches(&haystack, &needle, &cache))
            },
        )?;
    }
    Ok(())
}

/// NULL reads as `NULL`, blobs as empty text.
fn cell_text(value: ValueRef<'_>) -> Cow<'_, str> {
    match value {
        ValueRef::Null => Cow::Borrowed("NULL"),
        ValueRef::Integer(v) => Cow::Owned(v.to_string()),
        ValueRef::Real(v) => Cow::Owned(v.to_string()),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes),
        ValueRef::Blob(_) => Cow::Borrowed(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(conn: &Connection, function: &str, cell: &str, needle: &str) -> bool {
        conn.query_row(
            &format!("SELECT {}({}, ?)", function, cell),
            [needle],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_null_matches_literal_null() {
        let conn = Connection::open_in_memory().unwrap();
        register_find_functions(&conn, Arc::new(RegexCache::new())).unwrap();

        assert!(matches(&conn, "find_widget_compare", "NULL", "null"));
        assert!(matches(&conn, "find_widget_compare_w_c", "NULL", "NULL"));
        assert!(!matches(&conn, "find_widget_compare", "x'00'", "0"));
    }

    #[test]
    fn test_invalid_regex_matches_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        register_find_functions(&conn, Arc::new(RegexCache::new())).unwrap();

        assert!(matches(&conn, "find_widget_compare_r", "'abc'", "^a.c$"));
        assert!(!matches(&conn, "find_widget_compare_r", "'abc'", "(["));
    }
}
