//! Process-wide error log shown below the table.

use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    /// Operation that failed, e.g. `commit` or `reload`.
    pub context: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Store<Vec<ErrorEntry>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, context: &str, err: &dyn Display) {
        let message = err.to_string();
        error!(context, %message, "operation failed");
        self.entries.update(|entries| {
            entries.push(ErrorEntry {
                context: context.to_owned(),
                message,
                timestamp: Utc::now(),
            })
        });
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.get()
    }

    pub fn last(&self) -> Option<ErrorEntry> {
        self.entries.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.set(Vec::new());
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Vec<ErrorEntry>> {
        self.entries.subscribe()
    }
}
