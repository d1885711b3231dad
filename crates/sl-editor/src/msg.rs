//! Messages that drive the editor state machine
//!
//! All external stimuli are funneled into these typed messages
//! that are consumed by the Editor's update(msg) method.

use crate::draft::{DraftRequest, FieldEdit};
use crate::find::FindWidgetUpdate;
use crate::guard::ConfirmChoice;
use crate::paging::{PagingOptions, PagingUpdate};
use crossterm::event::{Event as CrosstermEvent, KeyEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Keyboard input event
    Key(KeyEvent),
    /// Click on a cell (absolute row, column index)
    Click { row: u64, column: usize },
    /// Periodic tick; applies pending external-change reloads
    Tick,
    SelectTable(String),
    SetPaging(PagingUpdate, PagingOptions),
    Find(FindWidgetUpdate),
    OpenDraft(DraftRequest),
    FieldChanged { field: usize, edit: FieldEdit },
    Commit,
    Cancel,
    Confirm(ConfirmChoice),
    Close,
}

/// Convert crossterm events to our Msg types
impl From<CrosstermEvent> for Msg {
    fn from(event: CrosstermEvent) -> Self {
        match event {
            CrosstermEvent::Key(key_event) => Msg::Key(key_event),
            _ => Msg::Tick,
        }
    }
}
