//! Draft statements being composed in the editor.
//!
//! Exactly one [`EditorDraft`] is active at a time. Field edits are pure:
//! [`EditorDraft::with_field`] returns a new draft and never touches the
//! database.

use crate::selector::RowSelector;
use serde::{Deserialize, Serialize};
use sl_gateway::{Record, SqlValue};

/// Type tag carried by every draft value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Number,
    Blob,
    Null,
    Default,
}

/// SQLite column affinity derived from a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Affinity rules from the SQLite documentation, applied in order.
    pub fn from_declared_type(declared_type: &str) -> Self {
        let upper = declared_type.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }
}

/// Type picked when the user starts typing into a NULL or DEFAULT field.
pub fn infer_data_type(declared_type: &str, text: &str) -> DataType {
    match Affinity::from_declared_type(declared_type) {
        Affinity::Text => DataType::Text,
        Affinity::Integer | Affinity::Real => DataType::Number,
        Affinity::Blob | Affinity::Numeric => {
            let looks_numeric = text
                .chars()
                .next()
                .map(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
                .unwrap_or(false);
            if looks_numeric {
                DataType::Number
            } else {
                DataType::Text
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftValue {
    pub text: String,
    pub data_type: DataType,
    /// Staging buffer for blob values.
    pub blob: Option<Vec<u8>>,
}

impl Default for DraftValue {
    fn default() -> Self {
        Self::with_type(DataType::Default)
    }
}

impl DraftValue {
    pub fn with_type(data_type: DataType) -> Self {
        Self {
            text: String::new(),
            data_type,
            blob: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data_type: DataType::Text,
            blob: None,
        }
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data_type: DataType::Number,
            blob: None,
        }
    }

    /// Draft value mirroring a fetched cell.
    pub fn from_sql(value: &SqlValue) -> Self {
        match value {
            SqlValue::Integer(_) | SqlValue::Real(_) => Self::number(value.to_string()),
            SqlValue::Text(text) => Self::text(text.clone()),
            SqlValue::Blob(bytes) => Self {
                text: String::new(),
                data_type: DataType::Blob,
                blob: Some(bytes.clone()),
            },
            SqlValue::Null => Self::with_type(DataType::Null),
        }
    }

    /// Apply one edit. Typing into a NULL or DEFAULT field infers its type;
    /// any other field keeps the type it has.
    pub fn edited(&self, edit: &FieldEdit, declared_type: &str) -> Self {
        let mut next = self.clone();
        match edit {
            FieldEdit::Text(text) => {
                if matches!(self.data_type, DataType::Null | DataType::Default) {
                    next.data_type = infer_data_type(declared_type, text);
                }
                next.text = text.clone();
            }
            FieldEdit::Type(data_type) => {
                next.data_type = *data_type;
                if *data_type == DataType::Blob && next.blob.is_none() {
                    next.blob = Some(Vec::new());
                }
            }
            FieldEdit::Blob(bytes) => {
                next.data_type = DataType::Blob;
                next.blob = Some(bytes.clone());
            }
        }
        next
    }
}

/// A single change to a draft field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldEdit {
    Text(String),
    Type(DataType),
    Blob(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftField {
    pub name: String,
    pub declared_type: String,
    pub value: DraftValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertDraft {
    pub table_name: String,
    pub fields: Vec<DraftField>,
}

/// Screen position of the cell being edited; `row` is absolute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: u64,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateDraft {
    pub table_name: String,
    pub column: String,
    pub declared_type: String,
    pub record: Record,
    pub value: DraftValue,
    /// Value as last fetched; `dirty` compares against it.
    pub original: DraftValue,
    pub selectors: Vec<RowSelector>,
    pub selected_selector: usize,
    pub dirty: bool,
    pub position: CellPosition,
    /// Cell is open for text entry rather than just selected.
    pub text_entry: bool,
}

impl UpdateDraft {
    pub fn selector(&self) -> Option<&RowSelector> {
        self.selectors.get(self.selected_selector)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDraft {
    pub table_name: String,
    pub record: Record,
    pub selectors: Vec<RowSelector>,
    pub selected_selector: usize,
    pub row: u64,
}

impl DeleteDraft {
    pub fn selector(&self) -> Option<&RowSelector> {
        self.selectors.get(self.selected_selector)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub affinity: String,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub unique: bool,
    pub not_null: bool,
    /// Raw SQL default expression.
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, affinity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affinity: affinity.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTableDraft {
    pub table_name: String,
    pub strict: bool,
    pub without_rowid: bool,
    pub columns: Vec<ColumnDef>,
    /// Free-text table constraints, e.g. `UNIQUE(a, b)`.
    pub table_constraints: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlterAction {
    RenameTo { new_name: String },
    RenameColumn { old_name: String, new_name: String },
    AddColumn(ColumnDef),
    DropColumn { column: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterTableDraft {
    pub table_name: String,
    pub action: AlterAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexDraft {
    pub table_name: String,
    pub index_name: String,
    pub unique: bool,
    /// Column list as typed, may contain expressions.
    pub indexed_columns: String,
    pub where_clause: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndexDraft {
    pub index_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropViewDraft {
    pub view_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropTableDraft {
    pub table_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQueryDraft {
    pub query: String,
}

/// Which draft to open, with the context it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftRequest {
    Insert,
    Update { row: u64, column: usize },
    Delete { row: u64 },
    CreateTable,
    AlterTable(AlterAction),
    CreateIndex,
    DropIndex { index_name: String },
    DropView { view_name: String },
    DropTable { table_name: String },
    CustomQuery { query: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    Insert,
    Update,
    Delete,
    CreateTable,
    AlterTable,
    CreateIndex,
    DropIndex,
    DropView,
    DropTable,
    CustomQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorDraft {
    Insert(InsertDraft),
    Update(UpdateDraft),
    Delete(DeleteDraft),
    CreateTable(CreateTableDraft),
    AlterTable(AlterTableDraft),
    CreateIndex(CreateIndexDraft),
    DropIndex(DropIndexDraft),
    DropView(DropViewDraft),
    DropTable(DropTableDraft),
    CustomQuery(CustomQueryDraft),
}

impl EditorDraft {
    pub fn kind(&self) -> DraftKind {
        match self {
            EditorDraft::Insert(_) => DraftKind::Insert,
            EditorDraft::Update(_) => DraftKind::Update,
            EditorDraft::Delete(_) => DraftKind::Delete,
            EditorDraft::CreateTable(_) => DraftKind::CreateTable,
            EditorDraft::AlterTable(_) => DraftKind::AlterTable,
            EditorDraft::CreateIndex(_) => DraftKind::CreateIndex,
            EditorDraft::DropIndex(_) => DraftKind::DropIndex,
            EditorDraft::DropView(_) => DraftKind::DropView,
            EditorDraft::DropTable(_) => DraftKind::DropTable,
            EditorDraft::CustomQuery(_) => DraftKind::CustomQuery,
        }
    }

    /// Whether committing may change the schema, so the table list has to be
    /// reloaded afterwards.
    pub fn changes_schema(&self) -> bool {
        !matches!(
            self,
            EditorDraft::Insert(_) | EditorDraft::Update(_) | EditorDraft::Delete(_)
        )
    }

    pub fn as_update(&self) -> Option<&UpdateDraft> {
        match self {
            EditorDraft::Update(draft) => Some(draft),
            _ => None,
        }
    }

    /// The update draft, if it holds unsaved text.
    pub fn dirty_update(&self) -> Option<&UpdateDraft> {
        self.as_update().filter(|draft| draft.dirty)
    }

    /// Pure field update. `field` indexes insert fields; update drafts have a
    /// single value and ignore it. Other variants are edited as whole structs.
    pub fn with_field(&self, field: usize, edit: &FieldEdit) -> EditorDraft {
        match self {
            EditorDraft::Insert(draft) => {
                let mut next = draft.clone();
                if let Some(target) = next.fields.get_mut(field) {
                    target.value = target.value.edited(edit, &target.declared_type);
                }
                EditorDraft::Insert(next)
            }
            EditorDraft::Update(draft) => {
                let mut next = draft.clone();
                next.value = draft.value.edited(edit, &draft.declared_type);
                next.dirty = next.value != next.original;
                EditorDraft::Update(next)
            }
            other => other.clone(),
        }
    }

    /// Value of an insert field or of the update cell.
    pub fn field_value(&self, field: usize) -> Option<&DraftValue> {
        match self {
            EditorDraft::Insert(draft) => draft.fields.get(field).map(|f| &f.value),
            EditorDraft::Update(draft) => Some(&draft.value),
            _ => None,
        }
    }
}
