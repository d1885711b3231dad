//! Editor core for the sheetlite SQLite table editor
//!
//! The editor follows a Model / Msg / ViewModel split:
//!
//! - [`model::Editor`] holds the state machine: paging, the record page,
//!   the active draft, find/filter state and the confirmation guard.
//! - [`msg::Msg`] carries every external stimulus into [`model::Editor::update`].
//! - [`viewmodel::TableViewModel`] is derived from the stores for rendering.
//!
//! All database access goes through [`sl_gateway::Gateway`].

pub mod config;
pub mod draft;
pub mod error;
pub mod error_log;
pub mod find;
pub mod guard;
pub mod indicator;
pub mod keyboard;
pub mod model;
pub mod msg;
pub mod paging;
pub mod record_store;
pub mod selector;
pub mod statement;
pub mod store;
pub mod viewmodel;

pub use config::EditorConfig;
pub use draft::{
    AlterAction, CellPosition, ColumnDef, DataType, DraftRequest, DraftValue, EditorDraft,
    FieldEdit,
};
pub use error::{EditorError, EditorResult};
pub use error_log::{ErrorEntry, ErrorLog};
pub use find::{FindWidgetState, FindWidgetUpdate};
pub use guard::{ConfirmChoice, PendingNavigation};
pub use model::{Editor, Outcome};
pub use msg::Msg;
pub use paging::{Paging, PagingOptions, PagingUpdate};
pub use record_store::{RecordPage, TableSnapshot};
pub use selector::RowSelector;
pub use statement::Statement;
pub use store::{EditorStores, Store};
pub use viewmodel::TableViewModel;
