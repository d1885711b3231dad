//! SQL generated from drafts.

use crate::draft::{
    AlterAction, AlterTableDraft, ColumnDef, CreateIndexDraft, CreateTableDraft, DataType,
    DeleteDraft, DraftValue, EditorDraft, InsertDraft, UpdateDraft,
};
use crate::error::{EditorError, EditorResult};
use lazy_static::lazy_static;
use regex::Regex;
use sl_gateway::{QueryMode, SqlValue};

lazy_static! {
    static ref INTEGER_LITERAL: Regex =
        Regex::new(r"^[+-]?\d+$").expect("integer literal pattern is valid");
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Parse a numeric field. Integers that fit in i64 stay exact; everything
/// else goes through f64. An empty field means 0.
pub fn parse_number(text: &str) -> EditorResult<SqlValue> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(SqlValue::Integer(0));
    }
    if INTEGER_LITERAL.is_match(trimmed) {
        if let Ok(value) = trimmed.parse::<i64>() {
            return Ok(SqlValue::Integer(value));
        }
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(SqlValue::Real(value)),
        _ => Err(EditorError::InvalidNumber(text.to_owned())),
    }
}

impl DraftValue {
    /// Bound parameter for this value; `None` for DEFAULT.
    pub fn to_sql(&self) -> EditorResult<Option<SqlValue>> {
        Ok(Some(match self.data_type {
            DataType::Text => SqlValue::Text(self.text.clone()),
            DataType::Number => parse_number(&self.text)?,
            DataType::Blob => SqlValue::Blob(self.blob.clone().unwrap_or_default()),
            DataType::Null => SqlValue::Null,
            DataType::Default => return Ok(None),
        }))
    }
}

/// A parameterized statement ready for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub mode: QueryMode,
}

impl Statement {
    fn write(sql: String, params: Vec<SqlValue>) -> Self {
        Self {
            sql,
            params,
            mode: QueryMode::ReadWrite,
        }
    }
}

/// Build the statement that commits `draft`.
pub fn build(draft: &EditorDraft) -> EditorResult<Statement> {
    match draft {
        EditorDraft::Insert(d) => insert(d),
        EditorDraft::Update(d) => update(d),
        EditorDraft::Delete(d) => delete(d),
        EditorDraft::CreateTable(d) => create_table(d),
        EditorDraft::AlterTable(d) => alter_table(d),
        EditorDraft::CreateIndex(d) => create_index(d),
        EditorDraft::DropIndex(d) => Ok(Statement::write(
            format!("DROP INDEX {}", quote_ident(&d.index_name)),
            Vec::new(),
        )),
        EditorDraft::DropView(d) => Ok(Statement::write(
            format!("DROP VIEW {}", quote_ident(&d.view_name)),
            Vec::new(),
        )),
        EditorDraft::DropTable(d) => Ok(Statement::write(
            format!("DROP TABLE {}", quote_ident(&d.table_name)),
            Vec::new(),
        )),
        EditorDraft::CustomQuery(d) => {
            if d.query.trim().is_empty() {
                return Err(EditorError::validation("query is empty"));
            }
            Ok(Statement::write(d.query.clone(), Vec::new()))
        }
    }
}

fn insert(draft: &InsertDraft) -> EditorResult<Statement> {
    let mut columns = Vec::new();
    let mut params = Vec::new();
    for field in &draft.fields {
        if let Some(value) = field.value.to_sql()? {
            columns.push(quote_ident(&field.name));
            params.push(value);
        }
    }

    let table = quote_ident(&draft.table_name);
    if columns.is_empty() {
        return Ok(Statement::write(
            format!("INSERT INTO {} DEFAULT VALUES", table),
            Vec::new(),
        ));
    }
    let placeholders = vec!["?"; params.len()].join(", ");
    Ok(Statement::write(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ),
        params,
    ))
}

fn update(draft: &UpdateDraft) -> EditorResult<Statement> {
    let selector = draft
        .selector()
        .ok_or_else(|| EditorError::validation("no row selector available"))?;
    let value = draft
        .value
        .to_sql()?
        .ok_or_else(|| EditorError::validation("DEFAULT can only be used when inserting"))?;

    let (clause, selector_params) = selector.where_clause();
    let mut params = vec![value];
    params.extend(selector_params);
    Ok(Statement::write(
        format!(
            "UPDATE {} SET {} = ? WHERE {}",
            quote_ident(&draft.table_name),
            quote_ident(&draft.column),
            clause
        ),
        params,
    ))
}

fn delete(draft: &DeleteDraft) -> EditorResult<Statement> {
    let selector = draft
        .selector()
        .ok_or_else(|| EditorError::validation("no row selector available"))?;
    let (clause, params) = selector.where_clause();
    Ok(Statement::write(
        format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(&draft.table_name),
            clause
        ),
        params,
    ))
}

/// Column definition as used by CREATE TABLE and ADD COLUMN.
pub fn column_def(column: &ColumnDef) -> EditorResult<String> {
    if column.name.is_empty() {
        return Err(EditorError::validation("column name is empty"));
    }
    if column.autoincrement && !column.primary_key {
        return Err(EditorError::validation(format!(
            "AUTOINCREMENT requires PRIMARY KEY on column {}",
            column.name
        )));
    }

    let mut def = quote_ident(&column.name);
    if !column.affinity.trim().is_empty() {
        def.push(' ');
        def.push_str(column.affinity.trim());
    }
    if column.primary_key {
        def.push_str(" PRIMARY KEY");
    }
    if column.autoincrement {
        def.push_str(" AUTOINCREMENT");
    }
    if column.unique {
        def.push_str(" UNIQUE");
    }
    if column.not_null {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = column.default.as_deref().filter(|d| !d.trim().is_empty()) {
        def.push_str(" DEFAULT ");
        def.push_str(default.trim());
    }
    Ok(def)
}

fn create_table(draft: &CreateTableDraft) -> EditorResult<Statement> {
    if draft.table_name.is_empty() {
        return Err(EditorError::validation("table name is empty"));
    }
    if draft.columns.is_empty() {
        return Err(EditorError::validation("a table needs at least one column"));
    }

    let mut defs = draft
        .columns
        .iter()
        .map(column_def)
        .collect::<EditorResult<Vec<_>>>()?;
    if !draft.table_constraints.trim().is_empty() {
        defs.push(draft.table_constraints.trim().to_owned());
    }

    let mut sql = format!(
        "CREATE TABLE {} ({})",
        quote_ident(&draft.table_name),
        defs.join(", ")
    );
    let options: Vec<&str> = [
        draft.strict.then_some("STRICT"),
        draft.without_rowid.then_some("WITHOUT ROWID"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !options.is_empty() {
        sql.push(' ');
        sql.push_str(&options.join(", "));
    }
    Ok(Statement::write(sql, Vec::new()))
}

fn alter_table(draft: &AlterTableDraft) -> EditorResult<Statement> {
    let table = quote_ident(&draft.table_name);
    let action = match &draft.action {
        AlterAction::RenameTo { new_name } => format!("RENAME TO {}", quote_ident(new_name)),
        AlterAction::RenameColumn { old_name, new_name } => format!(
            "RENAME COLUMN {} TO {}",
            quote_ident(old_name),
            quote_ident(new_name)
        ),
        AlterAction::AddColumn(column) => format!("ADD COLUMN {}", column_def(column)?),
        AlterAction::DropColumn { column } => format!("DROP COLUMN {}", quote_ident(column)),
    };
    Ok(Statement::write(
        format!("ALTER TABLE {} {}", table, action),
        Vec::new(),
    ))
}

fn create_index(draft: &CreateIndexDraft) -> EditorResult<Statement> {
    if draft.indexed_columns.trim().is_empty() {
        return Err(EditorError::validation("an index needs at least one column"));
    }
    let mut sql = format!(
        "CREATE {}INDEX {} ON {} ({})",
        if draft.unique { "UNIQUE " } else { "" },
        quote_ident(&draft.index_name),
        quote_ident(&draft.table_name),
        draft.indexed_columns.trim()
    );
    if !draft.where_clause.trim().is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(draft.where_clause.trim());
    }
    Ok(Statement::write(sql, Vec::new()))
}
