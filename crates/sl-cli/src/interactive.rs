//! Line-oriented driver: each stdin line becomes one editor message

use crate::browse::run_query;
use crate::render;
use crate::session::Session;
use anyhow::{anyhow, bail, Result};
use clap::Args;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sl_editor::draft::{CreateIndexDraft, CreateTableDraft};
use sl_editor::{
    AlterAction, ColumnDef, ConfirmChoice, DataType, DraftRequest, Editor, EditorDraft,
    EditorResult, FieldEdit, FindWidgetUpdate, Msg, Outcome, PagingOptions, PagingUpdate,
};
use sl_gateway::Gateway;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const MIN_TICK: Duration = Duration::from_millis(10);

const HELP: &str = "\
show | tables | reload | select NAME | top N | size N
find TEXT | find | regex on|off | case on|off | word on|off
click ROW COL | key NAME | set FIELD TEXT | null FIELD | default FIELD
insert | edit ROW COL | delete ROW | selector N
import-blob FIELD PATH | export-blob FIELD PATH
create-table NAME [strict] [without-rowid] COL[:TYPE[:pk|:autoincrement|:unique|:notnull]]...
create-index [unique] NAME COL... [where EXPR]
rename NEW | rename-column OLD NEW | add-column NAME [TYPE] | drop-column NAME
drop-table NAME | drop-view NAME | drop-index NAME
commit | cancel | confirm commit|discard|cancel
query-mode | sql QUERY | width COL N | help | quit";

#[derive(Args, Debug, Default)]
pub struct InteractiveArgs {
    /// Poll for changes made by other processes
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Editor(Msg),
    Show,
    Tables,
    Reload,
    Sql(String),
    /// Open a CREATE TABLE draft already filled in.
    CreateTable(CreateTableDraft),
    /// Open a CREATE INDEX draft on the selected table.
    CreateIndex(CreateIndexDraft),
    QueryMode,
    Selector(usize),
    Width(String, u64),
    ImportBlob(usize, PathBuf),
    ExportBlob(usize, PathBuf),
    Help,
    Quit,
}

impl InteractiveArgs {
    pub async fn run(self, session: &mut Session) -> Result<()> {
        let editor = &mut session.editor;
        if self.watch {
            editor.start_monitor();
        }
        println!("{}", render::table(&editor.view_model()));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(editor.config().poll_interval().max(MIN_TICK));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let command = match parse_command(&line) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(e) => {
                            println!("error: {}", e);
                            continue;
                        }
                    };
                    println!("{}", execute(editor, command).await);
                    if editor.is_closed() {
                        break;
                    }
                }
                _ = ticker.tick(), if self.watch => {
                    if let Ok(Outcome::Done) = editor.update(Msg::Tick).await {
                        debug!("reloaded after external change");
                        println!("{}", render::table(&editor.view_model()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Run one command and describe the result.
pub async fn execute<G: Gateway + 'static>(editor: &mut Editor<G>, command: Command) -> String {
    let result = match command {
        Command::Editor(msg) => editor
            .update(msg)
            .await
            .map(|outcome| status(editor, &outcome)),
        Command::Show => Ok(render::table(&editor.view_model())),
        Command::Tables => Ok(render::tables(&editor.tables())),
        Command::Reload => editor
            .full_reload()
            .await
            .map(|()| render::table(&editor.view_model())),
        Command::Sql(query) => {
            return match run_query(editor, &query).await {
                Ok(result) => render::query_result(&result),
                Err(e) => format!("error: {}", e),
            }
        }
        Command::CreateTable(table) => {
            open_filled(editor, DraftRequest::CreateTable, |draft| {
                if let EditorDraft::CreateTable(current) = draft {
                    *current = table;
                }
            })
            .await
        }
        Command::CreateIndex(index) => {
            open_filled(editor, DraftRequest::CreateIndex, |draft| {
                if let EditorDraft::CreateIndex(current) = draft {
                    *current = CreateIndexDraft {
                        table_name: current.table_name.clone(),
                        ..index
                    };
                }
            })
            .await
        }
        Command::QueryMode => editor
            .enter_custom_query_mode()
            .map(|outcome| status(editor, &outcome)),
        Command::Selector(index) => editor
            .select_row_selector(index)
            .map(|()| status(editor, &Outcome::Done)),
        Command::Width(column, width) => editor
            .set_column_width(&column, width)
            .await
            .map(|()| "ok".to_owned()),
        Command::ImportBlob(field, path) => editor
            .import_blob(field, &path)
            .await
            .map(|outcome| status(editor, &outcome)),
        Command::ExportBlob(field, path) => editor
            .export_blob(field, &path)
            .await
            .map(|outcome| describe(&outcome)),
        Command::Help => Ok(HELP.to_owned()),
        Command::Quit => editor.update(Msg::Close).await.map(|outcome| match outcome {
            Outcome::AwaitingConfirmation => describe(&outcome),
            _ => "bye".to_owned(),
        }),
    };
    result.unwrap_or_else(|e| format!("error: {}", e))
}

fn status<G: Gateway + 'static>(editor: &Editor<G>, outcome: &Outcome) -> String {
    format!("{}\n{}", render::table(&editor.view_model()), describe(outcome))
}

async fn open_filled<G: Gateway + 'static>(
    editor: &mut Editor<G>,
    request: DraftRequest,
    fill: impl FnOnce(&mut EditorDraft),
) -> EditorResult<String> {
    let outcome = editor.open_draft(request).await?;
    if outcome == Outcome::Done {
        editor.edit_draft(fill);
    }
    Ok(status(editor, &outcome))
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done => "ok".to_owned(),
        Outcome::AwaitingConfirmation => {
            "unsaved changes: confirm commit, discard or cancel".to_owned()
        }
        Outcome::Ignored => "ignored".to_owned(),
        Outcome::Failed(message) => format!("failed: {}", message),
    }
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T> {
    let word = word.ok_or_else(|| anyhow!("missing {}", what))?;
    word.parse()
        .map_err(|_| anyhow!("invalid {}: {}", what, word))
}

fn switch(word: Option<&str>) -> Result<bool> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("expected on or off"),
    }
}

fn required(rest: &str, what: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("missing {}", what);
    }
    Ok(rest.to_owned())
}

fn set_field(rest: &str, edit: impl FnOnce(&str) -> FieldEdit) -> Result<Msg> {
    let (field, value) = rest.split_once(' ').unwrap_or((rest, ""));
    Ok(Msg::FieldChanged {
        field: number(Some(field).filter(|f| !f.is_empty()), "field")?,
        edit: edit(value),
    })
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();

    let msg = match verb {
        "help" | "?" => return Ok(Some(Command::Help)),
        "quit" | "exit" | "q" => return Ok(Some(Command::Quit)),
        "show" => return Ok(Some(Command::Show)),
        "tables" => return Ok(Some(Command::Tables)),
        "reload" => return Ok(Some(Command::Reload)),
        "sql" => return Ok(Some(Command::Sql(required(rest, "query")?))),
        "query-mode" => return Ok(Some(Command::QueryMode)),
        "selector" => return Ok(Some(Command::Selector(number(words.next(), "selector")?))),
        "width" => {
            let column = words.next().ok_or_else(|| anyhow!("missing column"))?;
            let width = number(words.next(), "width")?;
            return Ok(Some(Command::Width(column.to_owned(), width)));
        }
        "import-blob" | "export-blob" => {
            let field = number(words.next(), "field")?;
            let path = words.collect::<Vec<_>>().join(" ");
            let path = PathBuf::from(required(&path, "path")?);
            return Ok(Some(if verb == "import-blob" {
                Command::ImportBlob(field, path)
            } else {
                Command::ExportBlob(field, path)
            }));
        }
        "create-table" => return Ok(Some(Command::CreateTable(parse_create_table(rest)?))),
        "create-index" => return Ok(Some(Command::CreateIndex(parse_create_index(rest)?))),

        "select" => Msg::SelectTable(required(rest, "table name")?),
        "top" => Msg::SetPaging(
            PagingUpdate::top(number(words.next(), "row")?),
            PagingOptions::default(),
        ),
        "size" => Msg::SetPaging(
            PagingUpdate::size(number(words.next(), "size")?),
            PagingOptions::default(),
        ),
        "find" => Msg::Find(FindWidgetUpdate::value(rest)),
        "regex" => Msg::Find(FindWidgetUpdate {
            regex: Some(switch(words.next())?),
            ..Default::default()
        }),
        "case" => Msg::Find(FindWidgetUpdate {
            case_sensitive: Some(switch(words.next())?),
            ..Default::default()
        }),
        "word" => Msg::Find(FindWidgetUpdate {
            whole_word: Some(switch(words.next())?),
            ..Default::default()
        }),

        "click" => Msg::Click {
            row: number(words.next(), "row")?,
            column: number(words.next(), "column")?,
        },
        "key" => Msg::Key(parse_key(rest)?),
        "set" => set_field(rest, |value| FieldEdit::Text(value.to_owned()))?,
        "null" => set_field(rest, |_| FieldEdit::Type(DataType::Null))?,
        "default" => set_field(rest, |_| FieldEdit::Type(DataType::Default))?,

        "insert" => Msg::OpenDraft(DraftRequest::Insert),
        "edit" => Msg::OpenDraft(DraftRequest::Update {
            row: number(words.next(), "row")?,
            column: number(words.next(), "column")?,
        }),
        "delete" => Msg::OpenDraft(DraftRequest::Delete {
            row: number(words.next(), "row")?,
        }),
        "rename" => Msg::OpenDraft(DraftRequest::AlterTable(AlterAction::RenameTo {
            new_name: required(rest, "new name")?,
        })),
        "rename-column" => Msg::OpenDraft(DraftRequest::AlterTable(AlterAction::RenameColumn {
            old_name: words.next().ok_or_else(|| anyhow!("missing column"))?.to_owned(),
            new_name: words.next().ok_or_else(|| anyhow!("missing new name"))?.to_owned(),
        })),
        "add-column" => {
            let name = words.next().ok_or_else(|| anyhow!("missing column"))?;
            let affinity = words.collect::<Vec<_>>().join(" ");
            Msg::OpenDraft(DraftRequest::AlterTable(AlterAction::AddColumn(
                ColumnDef::new(name, affinity),
            )))
        }
        "drop-column" => Msg::OpenDraft(DraftRequest::AlterTable(AlterAction::DropColumn {
            column: required(rest, "column")?,
        })),
        "drop-table" => Msg::OpenDraft(DraftRequest::DropTable {
            table_name: required(rest, "table name")?,
        }),
        "drop-view" => Msg::OpenDraft(DraftRequest::DropView {
            view_name: required(rest, "view name")?,
        }),
        "drop-index" => Msg::OpenDraft(DraftRequest::DropIndex {
            index_name: required(rest, "index name")?,
        }),

        "commit" => Msg::Commit,
        "cancel" => Msg::Cancel,
        "confirm" => Msg::Confirm(match words.next() {
            Some("commit") => ConfirmChoice::Commit,
            Some("discard") => ConfirmChoice::Discard,
            Some("cancel") => ConfirmChoice::Cancel,
            _ => bail!("expected commit, discard or cancel"),
        }),
        other => bail!("unknown command: {} (try help)", other),
    };
    Ok(Some(Command::Editor(msg)))
}

/// `NAME [strict] [without-rowid] col[:TYPE[:pk|:autoincrement|:unique|:notnull]]...`
pub fn parse_create_table(rest: &str) -> Result<CreateTableDraft> {
    let mut words = rest.split_whitespace();
    let mut table = CreateTableDraft {
        table_name: words
            .next()
            .ok_or_else(|| anyhow!("missing table name"))?
            .to_owned(),
        ..Default::default()
    };
    for word in words {
        match word {
            "strict" => table.strict = true,
            "without-rowid" => table.without_rowid = true,
            definition => {
                let mut parts = definition.split(':');
                let name = parts.next().unwrap_or_default();
                let mut column = ColumnDef::new(name, parts.next().unwrap_or_default());
                for flag in parts {
                    match flag {
                        "pk" => column.primary_key = true,
                        "autoincrement" => column.autoincrement = true,
                        "unique" => column.unique = true,
                        "notnull" => column.not_null = true,
                        other => bail!("unknown column flag: {}", other),
                    }
                }
                table.columns.push(column);
            }
        }
    }
    if table.columns.is_empty() {
        bail!("a table needs at least one column");
    }
    Ok(table)
}

/// `[unique] NAME COL... [where EXPR]`
pub fn parse_create_index(rest: &str) -> Result<CreateIndexDraft> {
    let (head, where_clause) = match rest.split_once(" where ") {
        Some((head, clause)) => (head, clause.trim().to_owned()),
        None => (rest, String::new()),
    };
    let mut words = head.split_whitespace().peekable();
    let unique = words.next_if_eq(&"unique").is_some();
    let index_name = words
        .next()
        .ok_or_else(|| anyhow!("missing index name"))?
        .to_owned();
    let columns: Vec<&str> = words.collect();
    if columns.is_empty() {
        bail!("an index needs at least one column");
    }
    Ok(CreateIndexDraft {
        index_name,
        unique,
        indexed_columns: columns.join(", "),
        where_clause,
        ..Default::default()
    })
}

/// Parse a key name such as `down`, `shift+enter` or `ctrl+end`.
pub fn parse_key(name: &str) -> Result<KeyEvent> {
    let name = name.trim();
    let lower = name.to_lowercase();
    let (modifiers, code) = match lower.as_str() {
        "up" => (KeyModifiers::NONE, KeyCode::Up),
        "down" => (KeyModifiers::NONE, KeyCode::Down),
        "left" => (KeyModifiers::NONE, KeyCode::Left),
        "right" => (KeyModifiers::NONE, KeyCode::Right),
        "tab" => (KeyModifiers::NONE, KeyCode::Tab),
        "backtab" | "shift+tab" => (KeyModifiers::SHIFT, KeyCode::BackTab),
        "enter" => (KeyModifiers::NONE, KeyCode::Enter),
        "shift+enter" => (KeyModifiers::SHIFT, KeyCode::Enter),
        "esc" | "escape" => (KeyModifiers::NONE, KeyCode::Esc),
        "backspace" => (KeyModifiers::NONE, KeyCode::Backspace),
        "pgup" | "pageup" => (KeyModifiers::NONE, KeyCode::PageUp),
        "pgdn" | "pagedown" => (KeyModifiers::NONE, KeyCode::PageDown),
        "ctrl+home" => (KeyModifiers::CONTROL, KeyCode::Home),
        "ctrl+end" => (KeyModifiers::CONTROL, KeyCode::End),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => (KeyModifiers::NONE, KeyCode::Char(c)),
                _ => bail!("unknown key: {}", name),
            }
        }
    };
    Ok(KeyEvent::new(code, modifiers))
}
