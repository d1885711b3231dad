//! ViewModel layer - derived presentation state shaped for rendering
//!
//! The edit mode of a cell is rendered purely from the active draft; the
//! view never owns input state of its own.

use crate::draft::{DraftKind, EditorDraft};
use crate::paging::Paging;
use crate::record_store::{RecordPage, TableSnapshot};
use sl_gateway::SqlValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellView {
    pub text: String,
    pub is_null: bool,
    pub selected: bool,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    /// Absolute row index.
    pub index: u64,
    pub cells: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableViewModel {
    pub table_name: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
    pub paging: Paging,
    pub draft_kind: Option<DraftKind>,
    pub dirty: bool,
    pub confirmation_pending: bool,
    pub querying: bool,
    pub last_error: Option<String>,
}

/// Inputs for [`TableViewModel::build`].
pub struct ViewSource<'a> {
    pub snapshot: Option<&'a TableSnapshot>,
    pub page: &'a RecordPage,
    pub paging: Paging,
    pub draft: Option<&'a EditorDraft>,
    pub confirmation_pending: bool,
    pub querying: bool,
    pub last_error: Option<String>,
}

pub fn render_value(value: &SqlValue) -> String {
    value.to_string()
}

impl TableViewModel {
    pub fn build(source: ViewSource<'_>) -> Self {
        let columns = source
            .snapshot
            .map(|s| s.column_names())
            .unwrap_or_default();
        let update = source.draft.and_then(EditorDraft::as_update);

        let rows = source
            .page
            .records
            .iter()
            .enumerate()
            .map(|(offset, record)| {
                let index = source.page.top + offset as u64;
                let cells = columns
                    .iter()
                    .enumerate()
                    .map(|(column, name)| {
                        let value = record.get(name).cloned().unwrap_or(SqlValue::Null);
                        let selected = update
                            .map(|u| u.position.row == index && u.position.column == column)
                            .unwrap_or(false);
                        let editing = selected && update.map(|u| u.text_entry).unwrap_or(false);
                        let text = match update {
                            Some(u) if selected && (u.text_entry || u.dirty) => {
                                u.value.text.clone()
                            }
                            _ => render_value(&value),
                        };
                        CellView {
                            text,
                            is_null: value.is_null(),
                            selected,
                            editing,
                        }
                    })
                    .collect();
                RowView { index, cells }
            })
            .collect();

        Self {
            table_name: source.snapshot.map(|s| s.table.name.clone()),
            columns,
            rows,
            paging: source.paging,
            draft_kind: source.draft.map(EditorDraft::kind),
            dirty: update.map(|u| u.dirty).unwrap_or(false),
            confirmation_pending: source.confirmation_pending,
            querying: source.querying,
            last_error: source.last_error,
        }
    }

    /// Rendered text of a visible cell (useful for assertions)
    pub fn cell_text(&self, row: u64, column: usize) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.index == row)
            .and_then(|r| r.cells.get(column))
            .map(|c| c.text.as_str())
    }

    pub fn selected_cell(&self) -> Option<(u64, usize)> {
        self.rows.iter().find_map(|row| {
            row.cells
                .iter()
                .position(|c| c.selected)
                .map(|column| (row.index, column))
        })
    }
}
