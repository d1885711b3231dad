//! Export tables or query results to CSV/TSV/JSON, import files into new tables
//!
//! Blobs are written as standard base64. On import every column is declared
//! `TEXT`; CSV fields arrive as text (an empty field is an empty string) and
//! JSON `null` or a missing key becomes NULL.

use crate::browse::{select_table, FindArgs};
use crate::session::Session;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Args, ValueEnum};
use serde_json::Value;
use sl_editor::statement::quote_ident;
use sl_gateway::{Gateway, QueryMode, QueryResult, SqlValue};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Csv,
    Tsv,
    Json,
}

impl Format {
    fn delimiter(self, delimiter: Option<char>) -> Result<u8> {
        match (self, delimiter) {
            (Format::Tsv, _) => Ok(b'\t'),
            (_, None) => Ok(b','),
            (_, Some(c)) if c.is_ascii() => Ok(c as u8),
            (_, Some(c)) => bail!("--delimiter must be a single ASCII character, got {:?}", c),
        }
    }
}

/// Arguments for the export command
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Table or view to export (defaults to the last one used)
    pub table: Option<String>,

    /// Export the rows of this read-only query instead of a table
    #[arg(long, conflicts_with_all = ["table", "find"])]
    pub query: Option<String>,

    #[command(flatten)]
    pub filter: FindArgs,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    pub format: Format,

    /// Field separator for csv (default `,`)
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Write here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

impl ExportArgs {
    pub async fn run(self, session: &mut Session) -> Result<()> {
        let result = match &self.query {
            Some(sql) => session.gateway().query(sql, &[], QueryMode::Read).await?,
            None => {
                select_table(&mut session.editor, self.table.as_deref()).await?;
                self.filter.apply(&mut session.editor).await?;
                session.editor.filtered_rows().await?
            }
        };

        let mut bytes = Vec::new();
        match self.format {
            Format::Json => write_json(&result, &mut bytes)?,
            format => write_csv(&result, format.delimiter(self.delimiter)?, &mut bytes)?,
        }

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(rows = result.records.len(), path = %path.display(), "exported");
                println!("{} rows written to {}", result.records.len(), path.display());
            }
            None => std::io::stdout().write_all(&bytes)?,
        }
        Ok(())
    }
}

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// New table to create; the import fails if it already exists
    pub table: String,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    pub format: Format,

    /// Field separator for csv (default `,`)
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Read from this file instead of stdin
    #[arg(long, short)]
    pub input: Option<PathBuf>,
}

impl ImportArgs {
    pub async fn run(self, session: &mut Session) -> Result<()> {
        let bytes = match &self.input {
            Some(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut bytes = Vec::new();
                tokio::io::stdin().read_to_end(&mut bytes).await?;
                bytes
            }
        };

        let (columns, rows) = match self.format {
            Format::Json => read_json(&bytes)?,
            format => read_csv(&bytes, format.delimiter(self.delimiter)?)?,
        };
        let count = import_rows(session.gateway().as_ref(), &self.table, &columns, &rows).await?;

        session.editor.full_reload().await?;
        println!("{} rows imported into {}", count, self.table);
        Ok(())
    }
}

fn csv_field(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Blob(bytes) => STANDARD.encode(bytes),
        other => other.to_string(),
    }
}

fn json_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::from(*v),
        SqlValue::Real(v) => Value::from(*v),
        SqlValue::Text(v) => Value::from(v.as_str()),
        SqlValue::Blob(bytes) => Value::from(STANDARD.encode(bytes)),
    }
}

/// Header row, then one record per row.
pub fn write_csv<W: Write>(result: &QueryResult, delimiter: u8, out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);
    writer.write_record(&result.columns)?;
    for record in &result.records {
        writer.write_record(result.columns.iter().map(|column| {
            csv_field(record.get(column).unwrap_or(&SqlValue::Null))
        }))?;
    }
    writer.flush()?;
    Ok(())
}

/// An array of objects whose keys keep the column order.
pub fn write_json<W: Write>(result: &QueryResult, mut out: W) -> Result<()> {
    out.write_all(b"[")?;
    for (i, record) in result.records.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(b"{")?;
        for (j, column) in result.columns.iter().enumerate() {
            if j > 0 {
                out.write_all(b",")?;
            }
            serde_json::to_writer(&mut out, column)?;
            out.write_all(b":")?;
            let value = record.get(column).unwrap_or(&SqlValue::Null);
            serde_json::to_writer(&mut out, &json_value(value))?;
        }
        out.write_all(b"}")?;
    }
    out.write_all(b"]\n")?;
    Ok(())
}

type Rows = (Vec<String>, Vec<Vec<SqlValue>>);

/// The first record names the columns. Ragged rows are an error.
pub fn read_csv(bytes: &[u8], delimiter: u8) -> Result<Rows> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    if columns.iter().all(String::is_empty) {
        bail!("No column headers present");
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(SqlValue::from).collect());
    }
    Ok((columns, rows))
}

/// An array of objects. Columns are every key seen, in first-seen order.
pub fn read_json(bytes: &[u8]) -> Result<Rows> {
    let objects: Vec<serde_json::Map<String, Value>> =
        serde_json::from_slice(bytes).context("Expected a JSON array of objects")?;

    let mut columns: Vec<String> = Vec::new();
    for object in &objects {
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    if columns.is_empty() {
        bail!("No data present");
    }

    let rows = objects
        .iter()
        .map(|object| {
            columns
                .iter()
                .map(|column| match object.get(column) {
                    None | Some(Value::Null) => SqlValue::Null,
                    Some(Value::String(s)) => SqlValue::from(s.as_str()),
                    Some(other) => SqlValue::from(other.to_string()),
                })
                .collect()
        })
        .collect();
    Ok((columns, rows))
}

/// Create `table` with `TEXT` columns and insert `rows` in one transaction.
pub async fn import_rows<G: Gateway + ?Sized>(
    gateway: &G,
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
) -> Result<u64> {
    gateway.query("BEGIN", &[], QueryMode::ReadWrite).await?;
    match insert_all(gateway, table, columns, rows).await {
        Ok(count) => {
            gateway.query("COMMIT", &[], QueryMode::ReadWrite).await?;
            info!(table, rows = count, "imported");
            Ok(count)
        }
        Err(e) => {
            if let Err(rollback) = gateway.query("ROLLBACK", &[], QueryMode::ReadWrite).await {
                warn!(error = %rollback, "rollback after failed import failed");
            }
            Err(e)
        }
    }
}

async fn insert_all<G: Gateway + ?Sized>(
    gateway: &G,
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
) -> Result<u64> {
    let table = quote_ident(table);
    let definitions: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    gateway
        .query(
            &format!("CREATE TABLE {} ({})", table, definitions.join(", ")),
            &[],
            QueryMode::ReadWrite,
        )
        .await?;

    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders
    );
    for row in rows {
        gateway.query(&insert, row, QueryMode::ReadWrite).await?;
    }
    Ok(rows.len() as u64)
}
