//! sheetlite CLI library

pub mod browse;
pub mod interactive;
pub mod render;
pub mod session;
pub mod transfer;

use anyhow::Result;
use session::{Session, SessionOptions};
use std::path::PathBuf;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sheetlite")]
#[command(about = "Spreadsheet-style editor for SQLite databases")]
#[command(version, long_about = None)]
pub struct Cli {
    /// SQLite database file
    pub database: PathBuf,

    /// Log filter (e.g. `debug` or `sl_editor=trace`); overrides RUST_LOG
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub options: SessionOptions,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tables and views
    Tables,
    /// Print one window of a table
    Show(browse::ShowArgs),
    /// Run one SQL statement, or a script with --script
    Exec(browse::ExecArgs),
    /// Write a table (optionally filtered) or a query result as csv, tsv or json
    Export(transfer::ExportArgs),
    /// Create a table from a csv, tsv or json file
    Import(transfer::ImportArgs),
    /// Drive the editor with commands read from stdin
    Interactive(interactive::InteractiveArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut session = Session::open(&self.database, &self.options).await?;
        let result = match self.command {
            Commands::Tables => {
                println!("{}", render::tables(&session.editor.tables()));
                Ok(())
            }
            Commands::Show(args) => args.run(&mut session).await,
            Commands::Exec(args) => args.run(&mut session).await,
            Commands::Export(args) => args.run(&mut session).await,
            Commands::Import(args) => args.run(&mut session).await,
            Commands::Interactive(args) => args.run(&mut session).await,
        };
        session.close().await;
        result
    }
}
