//! Plain-text rendering of view models and query results

use serde_json::{json, Map, Value};
use sl_editor::viewmodel::CellView;
use sl_editor::TableViewModel;
use sl_gateway::{QueryResult, TableSchema};
use std::fmt::Write;

const MAX_CELL_WIDTH: usize = 40;

fn clip(text: &str) -> String {
    let flat = text.replace(['\n', '\r', '\t'], " ");
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut clipped: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
    clipped.push('~');
    clipped
}

fn cell_label(cell: &CellView) -> String {
    let text = clip(&cell.text);
    if cell.editing {
        format!("{{{}}}", text)
    } else if cell.selected {
        format!("[{}]", text)
    } else {
        text
    }
}

fn grid(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
    };

    line(&mut out, header);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in rows {
        line(&mut out, row.as_slice());
    }
    out
}

/// The visible window with a status line.
pub fn table(view: &TableViewModel) -> String {
    let Some(name) = &view.table_name else {
        return "(no table selected)".to_owned();
    };

    let mut header = vec!["#".to_owned()];
    header.extend(view.columns.iter().map(|c| clip(c)));
    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![(row.index + 1).to_string()];
            cells.extend(row.cells.iter().map(cell_label));
            cells
        })
        .collect();

    let mut out = grid(&header, &rows);
    let paging = view.paging;
    let first = if view.rows.is_empty() {
        0
    } else {
        paging.visible_area_top + 1
    };
    let last = paging.visible_area_top + view.rows.len() as u64;
    let _ = write!(
        out,
        "{}: rows {}-{} of {}",
        name, first, last, paging.num_records
    );
    if let Some(kind) = &view.draft_kind {
        let _ = write!(out, " | draft: {:?}", kind);
    }
    if view.dirty {
        let _ = write!(out, " (modified)");
    }
    if view.confirmation_pending {
        let _ = write!(out, " | unsaved changes: confirm commit, discard or cancel");
    }
    if view.querying {
        let _ = write!(out, " | querying...");
    }
    if let Some(error) = &view.last_error {
        let _ = write!(out, "\nlast error: {}", error);
    }
    out
}

/// Visible rows as JSON objects keyed by column name.
pub fn rows_json(view: &TableViewModel) -> Value {
    let rows = view
        .rows
        .iter()
        .map(|row| {
            let cells: Map<String, Value> = view
                .columns
                .iter()
                .zip(&row.cells)
                .map(|(column, cell)| {
                    let value = if cell.is_null {
                        Value::Null
                    } else {
                        Value::String(cell.text.clone())
                    };
                    (column.clone(), value)
                })
                .collect();
            json!({ "row": row.index, "cells": cells })
        })
        .collect::<Vec<_>>();
    json!({
        "table": view.table_name,
        "top": view.paging.visible_area_top,
        "total": view.paging.num_records,
        "rows": rows,
    })
}

pub fn query_result(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "ok".to_owned();
    }
    let header: Vec<String> = result.columns.iter().map(|c| clip(c)).collect();
    let rows: Vec<Vec<String>> = result
        .records
        .iter()
        .map(|record| {
            result
                .columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .map(|v| clip(&v.to_string()))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    let mut out = grid(&header, &rows);
    let _ = write!(out, "({} rows)", result.records.len());
    out
}

pub fn tables(tables: &[TableSchema]) -> String {
    if tables.is_empty() {
        return "(no tables)".to_owned();
    }
    let width = tables.iter().map(|t| t.name.len()).max().unwrap_or(0);
    tables
        .iter()
        .map(|t| {
            let mut flags = vec![format!("{:?}", t.kind).to_lowercase()];
            if t.without_rowid {
                flags.push("without rowid".into());
            }
            if t.strict {
                flags.push("strict".into());
            }
            format!("{:<width$}  {}", t.name, flags.join(", "), width = width)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
