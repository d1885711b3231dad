//! The Model layer - editor state and the transitions between states
//!
//! `Editor` owns the gateway, the stores and the confirmation guard. Every
//! user-visible operation is an async method returning an [`Outcome`];
//! rendering lives in [`crate::viewmodel`].

use crate::config::EditorConfig;
use crate::draft::{
    AlterAction, AlterTableDraft, CellPosition, CreateIndexDraft, CreateTableDraft,
    CustomQueryDraft, DeleteDraft, DraftField, DraftRequest, DraftValue, DropIndexDraft,
    DropTableDraft, DropViewDraft, EditorDraft, FieldEdit, InsertDraft, UpdateDraft,
};
use crate::error::{EditorError, EditorResult};
use crate::error_log::ErrorLog;
use crate::find::{FilterPredicate, FindWidgetState, FindWidgetUpdate};
use crate::guard::{ConfirmChoice, ConfirmationGuard, ExternalChangeMonitor, PendingNavigation};
use crate::indicator::{QueryingIndicator, TrackedGateway};
use crate::keyboard::{self, NavCommand};
use crate::msg::Msg;
use crate::paging::{Paging, PagingOptions, PagingUpdate};
use crate::record_store::{RecordPage, RecordStore, TableSnapshot};
use crate::selector::candidate_selectors;
use crate::statement;
use crate::store::EditorStores;
use crate::viewmodel::{TableViewModel, ViewSource};
use crossterm::event::KeyEvent;
use serde_json::{json, Value};
use sl_gateway::{Gateway, QueryMode, QueryResult, SqlValue, StateStore, TableSchema};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const VISIBLE_AREA_SIZE_KEY: &str = "visibleAreaSize";
const LAST_TABLE_KEY: &str = "lastTable";

fn column_widths_key(table: &str) -> String {
    format!("columnWidths/{}", table)
}

/// Result of a user operation that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A dirty update draft holds the navigation back until
    /// [`Editor::resolve_confirmation`] is called.
    AwaitingConfirmation,
    /// Nothing to do (no draft, no usable row selector, no change).
    Ignored,
    /// The gateway rejected the operation. The message is also in the error log.
    Failed(String),
}

pub struct Editor<G: Gateway + 'static> {
    gateway: TrackedGateway<G>,
    state: Arc<dyn StateStore>,
    config: EditorConfig,
    stores: EditorStores,
    records: RecordStore,
    guard: ConfirmationGuard,
    indicator: Arc<QueryingIndicator>,
    monitor: Option<ExternalChangeMonitor>,
    selected_table: Option<String>,
    custom_query_mode: bool,
    last_query_result: Option<QueryResult>,
    column_widths: BTreeMap<String, u64>,
    external_change_pending: bool,
    closed: bool,
}

impl<G: Gateway + 'static> Editor<G> {
    pub fn new(
        gateway: Arc<G>,
        state: Arc<dyn StateStore>,
        config: EditorConfig,
        stores: EditorStores,
    ) -> Self {
        let indicator = QueryingIndicator::new(config.querying_indicator_delay());
        stores
            .paging
            .set(Paging::new(config.default_visible_area_size));

        Self {
            gateway: TrackedGateway::new(gateway, Arc::clone(&indicator)),
            state,
            records: RecordStore::new(stores.snapshot.clone(), stores.page.clone()),
            guard: ConfirmationGuard::new(stores.confirmation.clone()),
            config,
            stores,
            indicator,
            monitor: None,
            selected_table: None,
            custom_query_mode: false,
            last_query_result: None,
            column_widths: BTreeMap::new(),
            external_change_pending: false,
            closed: false,
        }
    }

    pub fn stores(&self) -> &EditorStores {
        &self.stores
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<G> {
        self.gateway.inner()
    }

    pub fn paging(&self) -> Paging {
        self.stores.paging.get()
    }

    pub fn draft(&self) -> Option<EditorDraft> {
        self.stores.draft.get()
    }

    pub fn tables(&self) -> Vec<TableSchema> {
        self.stores.tables.get()
    }

    pub fn snapshot(&self) -> Option<Arc<TableSnapshot>> {
        self.records.snapshot()
    }

    pub fn page(&self) -> Arc<RecordPage> {
        self.records.page()
    }

    pub fn selected_table(&self) -> Option<&str> {
        self.selected_table.as_deref()
    }

    pub fn find_state(&self) -> FindWidgetState {
        self.stores.find.get()
    }

    pub fn error_log(&self) -> &ErrorLog {
        &self.stores.errors
    }

    pub fn pending_confirmation(&self) -> Option<PendingNavigation> {
        self.guard.pending()
    }

    pub fn is_querying(&self) -> bool {
        self.indicator.is_visible()
    }

    /// Shared handle for shells that poll the indicator while a call runs.
    pub fn querying_indicator(&self) -> Arc<QueryingIndicator> {
        Arc::clone(&self.indicator)
    }

    pub fn last_query_result(&self) -> Option<&QueryResult> {
        self.last_query_result.as_ref()
    }

    pub fn column_widths(&self) -> &BTreeMap<String, u64> {
        &self.column_widths
    }

    pub fn is_custom_query_mode(&self) -> bool {
        self.custom_query_mode
    }

    /// Set when a change on disk was seen while auto reload is off.
    pub fn external_change_pending(&self) -> bool {
        self.external_change_pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Restore persisted state, load the table list and select the last
    /// used table (or the first one).
    pub async fn initialize(&mut self) -> EditorResult<()> {
        if let Some(size) = self
            .load_state(VISIBLE_AREA_SIZE_KEY)
            .await
            .and_then(|v| v.as_u64())
        {
            self.stores
                .paging
                .update(|p| *p = p.merged(PagingUpdate::size(size)));
        }

        self.reload_table_list().await?;

        let last = self
            .load_state(LAST_TABLE_KEY)
            .await
            .and_then(|v| v.as_str().map(String::from));
        let tables = self.tables();
        let initial = last
            .filter(|name| tables.iter().any(|t| &t.name == name))
            .or_else(|| tables.first().map(|t| t.name.clone()));

        match initial {
            Some(name) => self.do_select_table(name).await?,
            None => self.reset_draft(),
        }
        info!(table = ?self.selected_table, "editor initialized");
        Ok(())
    }

    /// Spawn the background poller for changes made by other connections.
    pub fn start_monitor(&mut self) {
        if self.monitor.is_some() {
            return;
        }
        let gateway: Arc<dyn Gateway> = self.gateway.inner().clone();
        self.monitor = Some(ExternalChangeMonitor::spawn(
            gateway,
            self.config.poll_interval(),
        ));
    }

    pub async fn reload_table_list(&mut self) -> EditorResult<()> {
        let tables = self.gateway.table_list().await?;
        debug!(count = tables.len(), "reloaded table list");
        self.stores.tables.set(tables);

        if let Some(name) = self.selected_table.clone() {
            if self.table_schema(&name).is_none() {
                info!(table = %name, "selected table no longer exists");
                self.selected_table = None;
                self.records.clear();
                self.stores.paging.update(|p| {
                    *p = p.merged(PagingUpdate {
                        visible_area_top: Some(0),
                        num_records: Some(0),
                        ..Default::default()
                    })
                });
                self.reset_draft();
            }
        }
        Ok(())
    }

    fn table_schema(&self, name: &str) -> Option<TableSchema> {
        self.stores
            .tables
            .borrow()
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    pub async fn select_table(&mut self, name: &str) -> EditorResult<Outcome> {
        if !self.intercept(PendingNavigation::SelectTable(name.to_owned()))? {
            return Ok(Outcome::AwaitingConfirmation);
        }
        self.do_select_table(name.to_owned()).await?;
        Ok(Outcome::Done)
    }

    async fn do_select_table(&mut self, name: String) -> EditorResult<()> {
        if self.table_schema(&name).is_none() {
            return Err(EditorError::validation(format!("no such table: {}", name)));
        }
        info!(table = %name, "selecting table");

        self.selected_table = Some(name.clone());
        self.custom_query_mode = false;
        self.records.clear();
        self.stores
            .paging
            .update(|p| *p = p.merged(PagingUpdate::top(0)));
        self.column_widths = self.load_column_widths(&name).await;

        self.reload(true, true).await?;
        self.reset_draft();
        self.save_state(LAST_TABLE_KEY, json!(name)).await;
        Ok(())
    }

    /// Re-fetch the current page, optionally together with the schema
    /// snapshot and the record count.
    pub async fn reload(&mut self, reload_schema: bool, reload_record_count: bool) -> EditorResult<()> {
        self.refresh(reload_schema, reload_record_count, false).await
    }

    /// Table list, schema, count and page.
    pub async fn full_reload(&mut self) -> EditorResult<()> {
        self.external_change_pending = false;
        self.reload_table_list().await?;
        self.reload(true, true).await
    }

    async fn refresh(
        &mut self,
        reload_schema: bool,
        reload_record_count: bool,
        scroll_to_end: bool,
    ) -> EditorResult<()> {
        let Some(name) = self.selected_table.clone() else {
            self.records.clear();
            return Ok(());
        };

        let snapshot = match self.records.snapshot() {
            Some(snapshot) if !reload_schema => snapshot,
            _ => {
                let table = self
                    .table_schema(&name)
                    .ok_or_else(|| EditorError::validation(format!("no such table: {}", name)))?;
                let snapshot = Arc::new(TableSnapshot::fetch(&self.gateway, &table).await?);
                self.records.set_snapshot(Some(Arc::clone(&snapshot)));
                snapshot
            }
        };

        let filter = self.filter_predicate(&snapshot);
        if reload_record_count {
            let count = RecordStore::fetch_count(&self.gateway, &snapshot, filter.as_ref()).await?;
            self.stores
                .paging
                .update(|p| *p = p.merged(PagingUpdate::records(count)));
        }
        if scroll_to_end {
            self.stores
                .paging
                .update(|p| *p = p.merged(PagingUpdate::top(i64::MAX)));
        }

        self.fetch_page(&snapshot, filter.as_ref()).await
    }

    async fn fetch_page(
        &mut self,
        snapshot: &TableSnapshot,
        filter: Option<&FilterPredicate>,
    ) -> EditorResult<()> {
        let paging = self.paging();
        let token = self.records.begin_fetch();
        let records = RecordStore::fetch_records(&self.gateway, snapshot, filter, &paging).await?;
        debug!(
            top = paging.visible_area_top,
            rows = records.len(),
            "fetched page"
        );
        self.records
            .apply_page(token, paging.visible_area_top, records);
        Ok(())
    }

    fn filter_predicate(&self, snapshot: &TableSnapshot) -> Option<FilterPredicate> {
        self.stores
            .find
            .borrow()
            .predicate(&snapshot.column_names())
    }

    pub async fn set_paging(
        &mut self,
        update: PagingUpdate,
        options: PagingOptions,
    ) -> EditorResult<Outcome> {
        self.guard.ensure_idle()?;
        if !options.preserve_draft && self.active_update().is_some() {
            if !self.intercept(PendingNavigation::SetPaging { update, options })? {
                return Ok(Outcome::AwaitingConfirmation);
            }
            self.reset_draft();
        }
        self.apply_paging(update, options.skip_reload).await?;
        Ok(Outcome::Done)
    }

    async fn apply_paging(&mut self, update: PagingUpdate, skip_reload: bool) -> EditorResult<()> {
        let next = self.paging().merged(update);
        self.stores.paging.set(next);
        if update.visible_area_size.is_some() {
            self.save_state(VISIBLE_AREA_SIZE_KEY, json!(next.visible_area_size))
                .await;
        }
        if !skip_reload {
            self.reload(false, false).await?;
        }
        Ok(())
    }

    async fn reveal_row(&mut self, row: u64) -> EditorResult<()> {
        if let Some(top) = self.paging().top_to_reveal(row) {
            self.apply_paging(PagingUpdate::top(top as i64), false)
                .await?;
        }
        Ok(())
    }

    /// `Ok(true)` when the navigation may go ahead now. A dirty update draft
    /// raises a confirmation instead.
    fn intercept(&self, navigation: PendingNavigation) -> EditorResult<bool> {
        self.guard.ensure_idle()?;
        if self.dirty_update().is_some() {
            self.guard.raise(navigation)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn active_update(&self) -> Option<UpdateDraft> {
        self.stores.draft.borrow().as_ref()?.as_update().cloned()
    }

    fn dirty_update(&self) -> Option<UpdateDraft> {
        self.active_update().filter(|u| u.dirty)
    }

    fn default_draft(&self) -> EditorDraft {
        if self.custom_query_mode {
            return EditorDraft::CustomQuery(CustomQueryDraft::default());
        }
        self.insert_draft()
            .unwrap_or_else(|_| EditorDraft::CreateTable(CreateTableDraft::default()))
    }

    fn reset_draft(&self) {
        self.stores.draft.set(Some(self.default_draft()));
    }

    fn require_table(&self) -> EditorResult<String> {
        self.selected_table
            .clone()
            .ok_or(EditorError::NoTableSelected)
    }

    fn insert_draft(&self) -> EditorResult<EditorDraft> {
        self.require_table()?;
        let snapshot = self.records.snapshot().ok_or(EditorError::NoTableSelected)?;
        let fields = snapshot
            .columns
            .iter()
            .filter(|c| !c.hidden)
            .map(|c| DraftField {
                name: c.name.clone(),
                declared_type: c.declared_type.clone(),
                value: DraftValue::default(),
            })
            .collect();
        Ok(EditorDraft::Insert(InsertDraft {
            table_name: snapshot.table.name.clone(),
            fields,
        }))
    }

    fn update_draft(&self, row: u64, column: usize) -> EditorResult<Option<EditorDraft>> {
        let snapshot = self.records.snapshot().ok_or(EditorError::NoTableSelected)?;
        let page = self.records.page();
        let record = page
            .record_at(row)
            .ok_or_else(|| EditorError::validation(format!("row {} is not loaded", row)))?
            .clone();
        let info = snapshot
            .columns
            .get(column)
            .ok_or_else(|| EditorError::validation(format!("no column at index {}", column)))?;

        let selectors = candidate_selectors(&record, &snapshot.unique_constraints());
        if selectors.is_empty() {
            warn!(table = %snapshot.table.name, row, "row has no usable selector");
            return Ok(None);
        }

        let value = DraftValue::from_sql(record.get(&info.name).unwrap_or(&SqlValue::Null));
        Ok(Some(EditorDraft::Update(UpdateDraft {
            table_name: snapshot.table.name.clone(),
            column: info.name.clone(),
            declared_type: info.declared_type.clone(),
            record,
            original: value.clone(),
            value,
            selectors,
            selected_selector: 0,
            dirty: false,
            position: CellPosition { row, column },
            text_entry: false,
        })))
    }

    fn delete_draft(&self, row: u64) -> EditorResult<Option<EditorDraft>> {
        let snapshot = self.records.snapshot().ok_or(EditorError::NoTableSelected)?;
        let page = self.records.page();
        let record = page
            .record_at(row)
            .ok_or_else(|| EditorError::validation(format!("row {} is not loaded", row)))?
            .clone();

        let selectors = candidate_selectors(&record, &snapshot.unique_constraints());
        if selectors.is_empty() {
            warn!(table = %snapshot.table.name, row, "row has no usable selector");
            return Ok(None);
        }
        Ok(Some(EditorDraft::Delete(DeleteDraft {
            table_name: snapshot.table.name.clone(),
            record,
            selectors,
            selected_selector: 0,
            row,
        })))
    }

    pub async fn open_draft(&mut self, request: DraftRequest) -> EditorResult<Outcome> {
        if !self.intercept(PendingNavigation::OpenDraft(request.clone()))? {
            return Ok(Outcome::AwaitingConfirmation);
        }
        self.do_open_draft(request).await
    }

    async fn do_open_draft(&mut self, request: DraftRequest) -> EditorResult<Outcome> {
        let draft = match request {
            DraftRequest::Insert => self.insert_draft()?,
            DraftRequest::Update { row, column } => {
                self.reveal_row(row).await?;
                match self.update_draft(row, column)? {
                    Some(draft) => draft,
                    None => return Ok(Outcome::Ignored),
                }
            }
            DraftRequest::Delete { row } => {
                self.reveal_row(row).await?;
                match self.delete_draft(row)? {
                    Some(draft) => draft,
                    None => return Ok(Outcome::Ignored),
                }
            }
            DraftRequest::CreateTable => EditorDraft::CreateTable(CreateTableDraft::default()),
            DraftRequest::AlterTable(action) => EditorDraft::AlterTable(AlterTableDraft {
                table_name: self.require_table()?,
                action,
            }),
            DraftRequest::CreateIndex => EditorDraft::CreateIndex(CreateIndexDraft {
                table_name: self.require_table()?,
                ..Default::default()
            }),
            DraftRequest::DropIndex { index_name } => {
                EditorDraft::DropIndex(DropIndexDraft { index_name })
            }
            DraftRequest::DropView { view_name } => {
                EditorDraft::DropView(DropViewDraft { view_name })
            }
            DraftRequest::DropTable { table_name } => {
                EditorDraft::DropTable(DropTableDraft { table_name })
            }
            DraftRequest::CustomQuery { query } => {
                EditorDraft::CustomQuery(CustomQueryDraft { query })
            }
        };
        debug!(kind = ?draft.kind(), "opened draft");
        self.stores.draft.set(Some(draft));
        Ok(Outcome::Done)
    }

    /// First click selects a cell, a second click on the same cell starts
    /// text entry.
    pub async fn click_cell(&mut self, row: u64, column: usize) -> EditorResult<Outcome> {
        self.guard.ensure_idle()?;
        if let Some(update) = self.active_update() {
            if update.position == (CellPosition { row, column }) {
                if update.text_entry {
                    return Ok(Outcome::Ignored);
                }
                self.set_text_entry(true);
                return Ok(Outcome::Done);
            }
        }
        self.open_draft(DraftRequest::Update { row, column }).await
    }

    fn set_text_entry(&self, on: bool) {
        self.stores.draft.update(|draft| {
            if let Some(EditorDraft::Update(update)) = draft {
                update.text_entry = on;
            }
        });
    }

    pub fn field_changed(&mut self, field: usize, edit: FieldEdit) -> Outcome {
        let Some(draft) = self.draft() else {
            return Outcome::Ignored;
        };
        self.stores.draft.set(Some(draft.with_field(field, &edit)));
        Outcome::Done
    }

    /// Arbitrary in-place edit of the draft (DDL form fields and the like).
    pub fn edit_draft(&mut self, f: impl FnOnce(&mut EditorDraft)) {
        self.stores.draft.update(|draft| {
            if let Some(draft) = draft {
                f(draft);
                if let EditorDraft::Update(update) = draft {
                    update.dirty = update.value != update.original;
                }
            }
        });
    }

    /// Choose which unique key identifies the row of an update or delete.
    pub fn select_row_selector(&mut self, index: usize) -> EditorResult<()> {
        let mut result = Ok(());
        self.stores.draft.update(|draft| {
            let (selectors, selected) = match draft {
                Some(EditorDraft::Update(d)) => (d.selectors.len(), &mut d.selected_selector),
                Some(EditorDraft::Delete(d)) => (d.selectors.len(), &mut d.selected_selector),
                _ => {
                    result = Err(EditorError::validation("draft has no row selector"));
                    return;
                }
            };
            if index >= selectors {
                result = Err(EditorError::validation(format!(
                    "selector {} out of range ({} available)",
                    index, selectors
                )));
                return;
            }
            *selected = index;
        });
        result
    }

    pub async fn commit(&mut self) -> EditorResult<Outcome> {
        self.guard.ensure_idle()?;
        Ok(self.commit_current().await)
    }

    async fn commit_current(&mut self) -> Outcome {
        let Some(draft) = self.draft() else {
            return Outcome::Ignored;
        };
        let statement = match statement::build(&draft) {
            Ok(statement) => statement,
            Err(e) => return self.fail("commit", e),
        };

        debug!(sql = %statement.sql, mode = ?statement.mode, "committing draft");
        let result = match self
            .gateway
            .query(&statement.sql, &statement.params, statement.mode)
            .await
        {
            Ok(result) => result,
            Err(e) => return self.fail("commit", EditorError::from(e)),
        };
        info!(kind = ?draft.kind(), "draft committed");

        self.after_commit(draft, result).await;
        Outcome::Done
    }

    async fn after_commit(&mut self, draft: EditorDraft, result: QueryResult) {
        let reloaded = if draft.changes_schema() {
            let reselect = match &draft {
                EditorDraft::CreateTable(d) => Some(d.table_name.clone()),
                EditorDraft::AlterTable(AlterTableDraft {
                    action: AlterAction::RenameTo { new_name },
                    ..
                }) => Some(new_name.clone()),
                _ => None,
            };
            if let EditorDraft::CustomQuery(_) = draft {
                self.last_query_result = Some(result);
            }
            self.reload_after_schema_change(reselect).await
        } else {
            let scroll_to_end =
                matches!(draft, EditorDraft::Insert(_)) && !self.find_state().is_active();
            self.refresh(false, true, scroll_to_end).await
        };

        self.reset_draft();
        if let Err(e) = reloaded {
            self.stores.errors.push("reload", &e);
        }
    }

    async fn reload_after_schema_change(&mut self, reselect: Option<String>) -> EditorResult<()> {
        self.reload_table_list().await?;
        let target = reselect
            .filter(|name| self.table_schema(name).is_some())
            .or_else(|| self.selected_table.clone());
        match target {
            Some(name) if self.selected_table.as_deref() != Some(name.as_str()) => {
                self.do_select_table(name).await
            }
            Some(_) => self.reload(true, true).await,
            None => Ok(()),
        }
    }

    fn fail(&self, context: &str, err: EditorError) -> Outcome {
        self.stores.errors.push(context, &err);
        Outcome::Failed(err.to_string())
    }

    /// Replace the draft with the default one for the current table.
    pub fn cancel(&mut self) -> EditorResult<()> {
        self.guard.ensure_idle()?;
        self.reset_draft();
        Ok(())
    }

    pub async fn resolve_confirmation(&mut self, choice: ConfirmChoice) -> EditorResult<Outcome> {
        let Some(navigation) = self.guard.take() else {
            return Ok(Outcome::Ignored);
        };
        info!(?choice, "confirmation resolved");

        match choice {
            ConfirmChoice::Cancel => return Ok(Outcome::Done),
            ConfirmChoice::Commit => {
                let outcome = self.commit_current().await;
                if outcome != Outcome::Done {
                    return Ok(outcome);
                }
            }
            ConfirmChoice::Discard => self.reset_draft(),
        }
        self.navigate(navigation).await
    }

    async fn navigate(&mut self, navigation: PendingNavigation) -> EditorResult<Outcome> {
        match navigation {
            PendingNavigation::SetPaging { update, options } => {
                self.apply_paging(update, options.skip_reload).await?
            }
            PendingNavigation::SelectTable(name) => self.do_select_table(name).await?,
            PendingNavigation::CustomQueryMode => self.do_enter_custom_query_mode(),
            PendingNavigation::SetFindWidgetState(update) => self.apply_find(update).await?,
            PendingNavigation::OpenDraft(request) => return self.do_open_draft(request).await,
            PendingNavigation::Close => self.do_close(),
        }
        Ok(Outcome::Done)
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> EditorResult<Outcome> {
        let Some(update) = self.active_update() else {
            return Ok(Outcome::Ignored);
        };
        let Some(command) = keyboard::interpret(key, update.text_entry) else {
            return Ok(Outcome::Ignored);
        };
        self.guard.ensure_idle()?;
        let position = update.position;

        match command {
            NavCommand::Move {
                rows,
                columns,
                commit_first,
            } => {
                if commit_first && update.dirty {
                    let outcome = self.commit_current().await;
                    if outcome != Outcome::Done {
                        return Ok(outcome);
                    }
                }
                let target = self.offset(position, rows, columns);
                self.move_selection(position, target, update.text_entry)
                    .await
            }
            NavCommand::FirstRow => {
                let target = CellPosition { row: 0, ..position };
                self.move_selection(position, target, false).await
            }
            NavCommand::LastRow => {
                let row = self.paging().last_row().unwrap_or(0);
                self.move_selection(position, CellPosition { row, ..position }, false)
                    .await
            }
            NavCommand::PageUp => {
                let size = self.paging().visible_area_size;
                let row = position.row.saturating_sub(size);
                self.move_selection(position, CellPosition { row, ..position }, false)
                    .await
            }
            NavCommand::PageDown => {
                let paging = self.paging();
                let row = position
                    .row
                    .saturating_add(paging.visible_area_size)
                    .min(paging.last_row().unwrap_or(0));
                self.move_selection(position, CellPosition { row, ..position }, false)
                    .await
            }
            NavCommand::OpenTextEntry => {
                self.set_text_entry(true);
                Ok(Outcome::Done)
            }
            NavCommand::LeaveTextEntry => {
                self.set_text_entry(false);
                Ok(Outcome::Done)
            }
            NavCommand::ClearDraft => {
                self.reset_draft();
                Ok(Outcome::Done)
            }
            NavCommand::Input(c) => {
                let mut text = update.value.text;
                text.push(c);
                Ok(self.field_changed(0, FieldEdit::Text(text)))
            }
            NavCommand::Backspace => {
                let mut text = update.value.text;
                if text.pop().is_none() {
                    return Ok(Outcome::Ignored);
                }
                Ok(self.field_changed(0, FieldEdit::Text(text)))
            }
        }
    }

    fn offset(&self, position: CellPosition, rows: i64, columns: i64) -> CellPosition {
        let last_row = self.paging().last_row().unwrap_or(0) as i64;
        let last_column = self
            .records
            .snapshot()
            .map(|s| s.columns.len().saturating_sub(1))
            .unwrap_or(0) as i64;
        CellPosition {
            row: (position.row as i64 + rows).clamp(0, last_row) as u64,
            column: (position.column as i64 + columns).clamp(0, last_column) as usize,
        }
    }

    async fn move_selection(
        &mut self,
        from: CellPosition,
        target: CellPosition,
        text_entry: bool,
    ) -> EditorResult<Outcome> {
        let still_selected = self
            .active_update()
            .map(|u| u.position == from)
            .unwrap_or(false);
        if still_selected && target == from {
            return Ok(Outcome::Ignored);
        }

        let outcome = self
            .open_draft(DraftRequest::Update {
                row: target.row,
                column: target.column,
            })
            .await?;
        if outcome == Outcome::Done && text_entry {
            self.set_text_entry(true);
        }
        Ok(outcome)
    }

    pub async fn set_find_widget_state(&mut self, update: FindWidgetUpdate) -> EditorResult<Outcome> {
        if !self.intercept(PendingNavigation::SetFindWidgetState(update.clone()))? {
            return Ok(Outcome::AwaitingConfirmation);
        }
        self.apply_find(update).await?;
        Ok(Outcome::Done)
    }

    async fn apply_find(&mut self, update: FindWidgetUpdate) -> EditorResult<()> {
        if self.active_update().is_some() {
            self.reset_draft();
        }
        let next = self.find_state().merged(&update);
        debug!(find = ?next, "find widget state changed");
        self.stores.find.set(next);
        self.stores
            .paging
            .update(|p| *p = p.merged(PagingUpdate::top(0)));
        self.reload(false, true).await
    }

    /// All rows of the selected table that pass the find widget filter.
    pub async fn filtered_rows(&self) -> EditorResult<QueryResult> {
        let snapshot = self
            .records
            .snapshot()
            .ok_or_else(|| EditorError::validation("no table is selected"))?;
        let filter = self.filter_predicate(&snapshot);
        let (sql, params) = snapshot.rows_query(filter.as_ref());
        let result = self.gateway.query(&sql, &params, QueryMode::Read).await?;
        debug!(table = %snapshot.table.name, rows = result.records.len(), "fetched filtered rows");
        Ok(result)
    }

    pub fn enter_custom_query_mode(&mut self) -> EditorResult<Outcome> {
        if !self.intercept(PendingNavigation::CustomQueryMode)? {
            return Ok(Outcome::AwaitingConfirmation);
        }
        self.do_enter_custom_query_mode();
        Ok(Outcome::Done)
    }

    fn do_enter_custom_query_mode(&mut self) {
        info!("entering custom query mode");
        self.custom_query_mode = true;
        self.selected_table = None;
        self.records.clear();
        self.reset_draft();
    }

    /// Apply a change flagged by the background monitor, if any.
    pub async fn handle_tick(&mut self) -> EditorResult<Outcome> {
        let changed = self
            .monitor
            .as_ref()
            .map(|m| m.take_change())
            .unwrap_or(false);
        if !changed {
            return Ok(Outcome::Ignored);
        }
        Ok(self.on_external_change().await)
    }

    /// Ask the gateway directly instead of waiting for the monitor.
    pub async fn poll_external_change(&mut self) -> EditorResult<Outcome> {
        if !self.gateway.external_change_detected().await? {
            return Ok(Outcome::Ignored);
        }
        Ok(self.on_external_change().await)
    }

    async fn on_external_change(&mut self) -> Outcome {
        if !self.config.auto_reload {
            info!("database changed externally, auto reload disabled");
            self.external_change_pending = true;
            return Outcome::Ignored;
        }
        info!("database changed externally, reloading");
        match self.full_reload().await {
            Ok(()) => Outcome::Done,
            Err(e) => self.fail("reload", e),
        }
    }

    pub async fn set_column_width(&mut self, column: &str, width: u64) -> EditorResult<()> {
        let table = self.require_table()?;
        self.column_widths.insert(column.to_owned(), width);
        let value = serde_json::to_value(&self.column_widths)
            .map_err(|e| EditorError::State(e.to_string()))?;
        self.save_state(&column_widths_key(&table), value).await;
        Ok(())
    }

    async fn load_column_widths(&self, table: &str) -> BTreeMap<String, u64> {
        self.load_state(&column_widths_key(table))
            .await
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// Read a file into a blob field of the draft.
    pub async fn import_blob(&mut self, field: usize, path: &Path) -> EditorResult<Outcome> {
        match self.gateway.import(path).await {
            Ok(bytes) => Ok(self.field_changed(field, FieldEdit::Blob(bytes))),
            Err(e) => Ok(self.fail("import", e.into())),
        }
    }

    /// Write a blob field of the draft to a file.
    pub async fn export_blob(&mut self, field: usize, path: &Path) -> EditorResult<Outcome> {
        let bytes = self
            .draft()
            .and_then(|d| d.field_value(field).and_then(|v| v.blob.clone()));
        let Some(bytes) = bytes else {
            return Ok(self.fail("export", EditorError::validation("field holds no blob")));
        };
        match self.gateway.export(path, &bytes).await {
            Ok(()) => Ok(Outcome::Done),
            Err(e) => Ok(self.fail("export", e.into())),
        }
    }

    pub fn close(&mut self) -> EditorResult<Outcome> {
        if !self.intercept(PendingNavigation::Close)? {
            return Ok(Outcome::AwaitingConfirmation);
        }
        self.do_close();
        Ok(Outcome::Done)
    }

    fn do_close(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.stores.draft.set(None);
        self.closed = true;
        info!("editor closed");
    }

    pub async fn update(&mut self, msg: Msg) -> EditorResult<Outcome> {
        match msg {
            Msg::Key(key) => self.handle_key(key).await,
            Msg::Click { row, column } => self.click_cell(row, column).await,
            Msg::Tick => self.handle_tick().await,
            Msg::SelectTable(name) => self.select_table(&name).await,
            Msg::SetPaging(update, options) => self.set_paging(update, options).await,
            Msg::Find(update) => self.set_find_widget_state(update).await,
            Msg::OpenDraft(request) => self.open_draft(request).await,
            Msg::FieldChanged { field, edit } => Ok(self.field_changed(field, edit)),
            Msg::Commit => self.commit().await,
            Msg::Cancel => self.cancel().map(|()| Outcome::Done),
            Msg::Confirm(choice) => self.resolve_confirmation(choice).await,
            Msg::Close => self.close(),
        }
    }

    pub fn view_model(&self) -> TableViewModel {
        let snapshot = self.records.snapshot();
        let page = self.records.page();
        let draft = self.draft();
        TableViewModel::build(ViewSource {
            snapshot: snapshot.as_deref(),
            page: &page,
            paging: self.paging(),
            draft: draft.as_ref(),
            confirmation_pending: self.guard.is_pending(),
            querying: self.indicator.is_visible(),
            last_error: self.stores.errors.last().map(|e| e.message),
        })
    }

    async fn load_state(&self, key: &str) -> Option<Value> {
        match self.state.get_state(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read editor state");
                None
            }
        }
    }

    async fn save_state(&self, key: &str, value: Value) {
        if let Err(e) = self.state.set_state(key, value).await {
            warn!(key, error = %e, "failed to persist editor state");
        }
    }
}
