//! Observable state containers.
//!
//! Each piece of editor state lives in a [`Store`] that the embedding shell
//! can subscribe to. Stores are created by the shell and injected into the
//! editor, so two editors never share state by accident.

use crate::draft::EditorDraft;
use crate::error_log::ErrorLog;
use crate::find::FindWidgetState;
use crate::guard::PendingNavigation;
use crate::paging::Paging;
use crate::record_store::{RecordPage, TableSnapshot};
use sl_gateway::TableSchema;
use std::sync::Arc;
use tokio::sync::watch;

/// A value with change notification.
#[derive(Debug)]
pub struct Store<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Store<T> {
    pub fn new(value: T) -> Self {
        let (sender, _) = watch::channel(value);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn borrow(&self) -> watch::Ref<'_, T> {
        self.sender.borrow()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.sender.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Store<T> {
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }
}

/// Every store the editor publishes, bundled for injection.
#[derive(Debug, Clone, Default)]
pub struct EditorStores {
    pub tables: Store<Vec<TableSchema>>,
    pub snapshot: Store<Option<Arc<TableSnapshot>>>,
    pub page: Store<Arc<RecordPage>>,
    pub paging: Store<Paging>,
    pub draft: Store<Option<EditorDraft>>,
    pub find: Store<FindWidgetState>,
    pub confirmation: Store<Option<PendingNavigation>>,
    pub errors: ErrorLog,
}
