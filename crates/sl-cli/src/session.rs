//! Opening a database and wiring the editor around it

use anyhow::{Context, Result};
use clap::Args;
use sl_editor::{ConfirmChoice, Editor, EditorConfig, EditorStores, Outcome};
use sl_gateway::{MemoryStateStore, QueuedGateway, StateStore};
use sl_sqlite::{Database, PreferenceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct SessionOptions {
    /// Open the database read-only
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Editor configuration file (JSON)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Rows per window until a saved size is restored
    #[arg(long, global = true, value_name = "ROWS", value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Do not reload when another process changes the database
    #[arg(long, global = true)]
    pub no_auto_reload: bool,

    /// Keep UI preferences in memory only
    #[arg(long, global = true)]
    pub no_preferences: bool,
}

impl SessionOptions {
    pub fn editor_config(&self) -> Result<EditorConfig> {
        let mut config = match &self.config {
            Some(path) => EditorConfig::load(path)?,
            None => EditorConfig::default(),
        };
        if let Some(size) = self.page_size {
            config.default_visible_area_size = size;
        }
        if self.no_auto_reload {
            config.auto_reload = false;
        }
        Ok(config)
    }

    fn state_store(&self, database: &Path) -> Arc<dyn StateStore> {
        if self.no_preferences {
            return Arc::new(MemoryStateStore::new());
        }
        let scope = std::fs::canonicalize(database)
            .unwrap_or_else(|_| database.to_path_buf())
            .display()
            .to_string();
        match PreferenceStore::open_default(scope) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "preferences unavailable, keeping them in memory");
                Arc::new(MemoryStateStore::new())
            }
        }
    }
}

pub type SessionEditor = Editor<QueuedGateway>;

/// One open database with its editor.
pub struct Session {
    pub editor: SessionEditor,
    gateway: Arc<QueuedGateway>,
}

impl Session {
    pub async fn open(path: &Path, options: &SessionOptions) -> Result<Self> {
        let database = if options.read_only {
            Database::open_read_only(path)
        } else {
            Database::open(path)
        }
        .with_context(|| format!("Failed to open database {}", path.display()))?;

        let gateway = Arc::new(QueuedGateway::spawn(Arc::new(database)));
        let mut editor = Editor::new(
            Arc::clone(&gateway),
            options.state_store(path),
            options.editor_config()?,
            EditorStores::default(),
        );
        editor
            .initialize()
            .await
            .context("Failed to load the database schema")?;

        info!(path = %path.display(), "session opened");
        Ok(Self { editor, gateway })
    }

    pub fn gateway(&self) -> &Arc<QueuedGateway> {
        &self.gateway
    }

    /// Stop background work. One-shot commands have nobody to ask, so an
    /// unsaved edit left at this point is discarded with a warning.
    pub async fn close(&mut self) {
        if self.editor.is_closed() {
            self.gateway.shutdown();
            return;
        }
        let closed = match self.editor.close() {
            Ok(Outcome::AwaitingConfirmation) => {
                warn!("discarding unsaved edit on exit");
                self.editor
                    .resolve_confirmation(ConfirmChoice::Discard)
                    .await
                    .map(|_| ())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = closed {
            warn!(error = %e, "failed to close editor");
        }
        self.gateway.shutdown();
    }
}
