//! Confirmation before discarding unsaved edits, and external change polling.

use crate::draft::DraftRequest;
use crate::error::{EditorError, EditorResult};
use crate::find::FindWidgetUpdate;
use crate::paging::{PagingOptions, PagingUpdate};
use crate::store::Store;
use sl_gateway::Gateway;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Answer to the commit / discard / cancel dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Commit,
    Discard,
    Cancel,
}

/// A navigation held back until the user answers the dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingNavigation {
    SetPaging {
        update: PagingUpdate,
        options: PagingOptions,
    },
    SelectTable(String),
    CustomQueryMode,
    SetFindWidgetState(FindWidgetUpdate),
    OpenDraft(DraftRequest),
    Close,
}

/// At most one outstanding confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationGuard {
    pending: Store<Option<PendingNavigation>>,
}

impl ConfirmationGuard {
    pub fn new(pending: Store<Option<PendingNavigation>>) -> Self {
        Self { pending }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub fn pending(&self) -> Option<PendingNavigation> {
        self.pending.get()
    }

    /// Fails while another confirmation is outstanding.
    pub fn ensure_idle(&self) -> EditorResult<()> {
        if self.is_pending() {
            return Err(EditorError::ConfirmationPending);
        }
        Ok(())
    }

    pub fn raise(&self, navigation: PendingNavigation) -> EditorResult<()> {
        self.ensure_idle()?;
        debug!(?navigation, "confirmation required");
        self.pending.set(Some(navigation));
        Ok(())
    }

    pub fn take(&self) -> Option<PendingNavigation> {
        let navigation = self.pending.get();
        if navigation.is_some() {
            self.pending.set(None);
        }
        navigation
    }
}

/// Background task polling the gateway for changes made by other processes.
pub struct ExternalChangeMonitor {
    changed: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ExternalChangeMonitor {
    pub fn spawn(gateway: Arc<dyn Gateway>, interval: Duration) -> Self {
        let changed = Arc::new(AtomicBool::new(false));
        let cancellation_token = CancellationToken::new();

        let handle = tokio::spawn(Self::poll_loop(
            gateway,
            interval,
            Arc::clone(&changed),
            cancellation_token.clone(),
        ));

        Self {
            changed,
            cancellation_token,
            handle,
        }
    }

    /// Whether a change was seen since the last call.
    pub fn take_change(&self) -> bool {
        self.changed.swap(false, Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn poll_loop(
        gateway: Arc<dyn Gateway>,
        interval: Duration,
        changed: Arc<AtomicBool>,
        cancellation_token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so the baseline stands.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    match gateway.external_change_detected().await {
                        Ok(true) => changed.store(true, Ordering::SeqCst),
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "external change poll failed"),
                    }
                }
            }
        }
        debug!("external change monitor stopped");
    }
}

impl Drop for ExternalChangeMonitor {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
