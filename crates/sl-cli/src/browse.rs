//! One-shot commands: show a window, run a statement

use crate::render;
use crate::session::Session;
use anyhow::{bail, Result};
use clap::Args;
use sl_editor::{DraftRequest, Editor, FindWidgetUpdate, Outcome, PagingOptions, PagingUpdate};
use sl_gateway::{Gateway, QueryMode, QueryResult};

/// Find widget flags shared by commands that read a table
#[derive(Args, Debug, Default, Clone)]
pub struct FindArgs {
    /// Only rows where some cell matches this text
    #[arg(long)]
    pub find: Option<String>,

    /// Treat --find as a regular expression
    #[arg(long)]
    pub regex: bool,

    /// Match --find case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Match --find against whole words only
    #[arg(long)]
    pub whole_word: bool,
}

impl FindArgs {
    pub async fn apply<G: Gateway + 'static>(&self, editor: &mut Editor<G>) -> Result<()> {
        let Some(find) = &self.find else {
            return Ok(());
        };
        editor
            .set_find_widget_state(FindWidgetUpdate {
                value: Some(find.clone()),
                case_sensitive: Some(self.case_sensitive),
                whole_word: Some(self.whole_word),
                regex: Some(self.regex),
            })
            .await?;
        Ok(())
    }
}

/// Select `table` when given and fail when nothing ends up selected.
pub async fn select_table<G: Gateway + 'static>(
    editor: &mut Editor<G>,
    table: Option<&str>,
) -> Result<()> {
    if let Some(table) = table {
        editor.select_table(table).await?;
    }
    if editor.selected_table().is_none() {
        bail!("The database has no tables");
    }
    Ok(())
}

/// Arguments for the show command
#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Table or view to show (defaults to the last one used)
    pub table: Option<String>,

    /// Index of the first row to show
    #[arg(long, default_value_t = 0)]
    pub top: i64,

    /// Number of rows to show
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub rows: Option<u64>,

    #[command(flatten)]
    pub filter: FindArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub async fn run(self, session: &mut Session) -> Result<()> {
        println!("{}", self.render(&mut session.editor).await?);
        Ok(())
    }

    pub async fn render<G: Gateway + 'static>(&self, editor: &mut Editor<G>) -> Result<String> {
        select_table(editor, self.table.as_deref()).await?;
        self.filter.apply(editor).await?;

        let update = PagingUpdate {
            visible_area_top: Some(self.top),
            visible_area_size: self.rows,
            num_records: None,
        };
        editor.set_paging(update, PagingOptions::default()).await?;

        let view = editor.view_model();
        if self.json {
            return Ok(serde_json::to_string_pretty(&render::rows_json(&view))?);
        }
        Ok(render::table(&view))
    }
}

/// Arguments for the exec command
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// SQL to run
    pub sql: String,

    /// Run several statements separated by semicolons (no result rows)
    #[arg(long)]
    pub script: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ExecArgs {
    pub async fn run(self, session: &mut Session) -> Result<()> {
        if self.script {
            session
                .gateway()
                .query(&self.sql, &[], QueryMode::Script)
                .await?;
            println!("ok");
            return Ok(());
        }

        let result = run_query(&mut session.editor, &self.sql).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", render::query_result(&result));
        }
        Ok(())
    }
}

/// Run `sql` as a custom query draft so the editor reloads afterwards.
pub async fn run_query<G: Gateway + 'static>(
    editor: &mut Editor<G>,
    sql: &str,
) -> Result<QueryResult> {
    editor
        .open_draft(DraftRequest::CustomQuery {
            query: sql.to_owned(),
        })
        .await?;
    match editor.commit().await? {
        Outcome::Failed(message) => bail!(message),
        _ => Ok(editor.last_query_result().cloned().unwrap_or_default()),
    }
}
