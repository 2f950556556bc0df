//! Grid model: deferred cell edits against tabular widgets.
//!
//! Grid edits in the target application are visually modal (every cell
//! opens an inline editor) and rows only exist once the UI materializes
//! them, so cell operations cannot be applied the moment a test script
//! declares them. Callers queue inputs and checks eagerly on a
//! [`GridSession`] and flush them later with one [`GridSession::commit`],
//! which applies everything in FIFO order against the live grid.
//!
//! Row indices and column occurrences are 1-based throughout, matching how
//! test specifications talk about grids.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::adapter::{DomAdapter, EditorKind};
use crate::assign::{truncate_to_length, values_match, InputStrategy, INPUT_STRATEGIES};
use crate::config::EngineConfig;
use crate::container::{active_container, Container};
use crate::driver::{ClickKind, Driver, Key};
use crate::errors::EngineError;
use crate::field::ValueKind;
use crate::locator::normalize_label;
use crate::snapshot::{FrameContext, Node, NodeRef, Snapshot};
use crate::store::SessionStore;

/// Which column a cell operation targets. `occurrence` disambiguates
/// duplicated header names (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub occurrence: usize,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            occurrence: 1,
        }
    }

    pub fn occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence.max(1);
        self
    }
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        ColumnSpec::new(name)
    }
}

/// Options for a queued input operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputOptions {
    /// Explicit 1-based target row; defaults to the grid's last row.
    pub row_index: Option<usize>,
    /// Materialize a new row before writing.
    pub new_row: bool,
    /// Skip read-back verification for this cell.
    pub no_verify: bool,
    /// Duplicate-header disambiguation: (lowercased name, 1-based
    /// occurrence). Overrides the column spec's occurrence when present.
    pub disambiguator: Option<(String, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingInput {
    column: ColumnSpec,
    value: String,
    options: InputOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingCheck {
    /// 1-based row, or `None` for the currently selected row.
    row_index: Option<usize>,
    column: ColumnSpec,
    expected: String,
    disambiguator: Option<(String, usize)>,
}

/// One grid widget on screen plus its pending operation queues.
///
/// Queues are cleared only by `commit()`; non-empty queues at a test-case
/// boundary indicate a caller bug. `commit()` leaves the queues empty even
/// when an operation fails, so a retried test case cannot re-apply edits.
pub struct GridSession {
    driver: Arc<dyn Driver>,
    adapter: Arc<dyn DomAdapter>,
    config: EngineConfig,
    store: Arc<SessionStore>,
    frame: FrameContext,
    grid_index: usize,
    inputs: Vec<PendingInput>,
    checks: Vec<PendingCheck>,
}

/// An owned snapshot narrowed to one grid.
struct GridView {
    snapshot: Snapshot,
    container: Container,
    grid_path: Vec<usize>,
    grid_id: String,
}

impl GridView {
    fn grid_node(&self) -> &Node {
        let mut path = self.container.path.clone();
        path.extend(self.grid_path.iter().copied());
        self.snapshot
            .node_at(&path)
            .expect("grid path derived from this snapshot")
    }

    fn node_ref(&self, rel_to_grid: &[usize]) -> NodeRef {
        let mut path = self.container.path.clone();
        path.extend(self.grid_path.iter().copied());
        path.extend_from_slice(rel_to_grid);
        NodeRef::new(self.snapshot.frame.clone(), path)
    }
}

impl GridSession {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        adapter: Arc<dyn DomAdapter>,
        config: EngineConfig,
        store: Arc<SessionStore>,
        frame: FrameContext,
        grid_index: usize,
    ) -> Self {
        Self {
            driver,
            adapter,
            config,
            store,
            frame,
            grid_index,
            inputs: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// Queue a cell input. Validation-light on purpose: the grid may
    /// legitimately change between queueing and commit.
    pub fn queue_input(
        &mut self,
        column: impl Into<ColumnSpec>,
        value: impl Into<String>,
        options: InputOptions,
    ) {
        self.inputs.push(PendingInput {
            column: column.into(),
            value: value.into(),
            options,
        });
    }

    /// Queue a read-assert against a cell. `row_index` is 1-based; `None`
    /// targets the currently selected row.
    pub fn queue_check(
        &mut self,
        row_index: Option<usize>,
        column: impl Into<ColumnSpec>,
        expected: impl Into<String>,
        disambiguator: Option<(String, usize)>,
    ) {
        self.checks.push(PendingCheck {
            row_index,
            column: column.into(),
            expected: expected.into(),
            disambiguator,
        });
    }

    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn pending_checks(&self) -> usize {
        self.checks.len()
    }

    /// Apply every queued operation in FIFO order, inputs first, then
    /// checks. Both queues are drained before execution starts; a failure
    /// escalates after the drain, never with operations still queued.
    #[instrument(level = "debug", skip(self))]
    pub async fn commit(&mut self) -> Result<(), EngineError> {
        let inputs = std::mem::take(&mut self.inputs);
        let checks = std::mem::take(&mut self.checks);
        debug!(
            inputs = inputs.len(),
            checks = checks.len(),
            grid = self.grid_index,
            "committing grid queues"
        );

        for input in inputs {
            self.apply_input(&input).await?;
        }
        for check in checks {
            self.apply_check(&check).await?;
        }
        Ok(())
    }

    /// Discard queued operations without applying them. Called on fatal
    /// errors so a session restart does not inherit stale edits.
    pub fn clear_queues(&mut self) {
        if !self.inputs.is_empty() || !self.checks.is_empty() {
            warn!(
                inputs = self.inputs.len(),
                checks = self.checks.len(),
                "clearing unapplied grid queues"
            );
        }
        self.inputs.clear();
        self.checks.clear();
    }

    /// Number of data rows the grid currently shows.
    pub async fn row_count(&self) -> Result<usize, EngineError> {
        let view = self.view().await?;
        Ok(self.adapter.data_rows(view.grid_node()).len())
    }

    // ----- snapshot access -----

    async fn view(&self) -> Result<GridView, EngineError> {
        let snapshot = self.driver.snapshot(&self.frame).await?;
        let container = active_container(&snapshot, self.adapter.as_ref()).ok_or_else(|| {
            EngineError::GridNotFound("no active container".into())
        })?;
        self.store.note_container(&container.id);
        let container_node = snapshot
            .node_at(&container.path)
            .ok_or_else(|| EngineError::Internal("container path vanished".into()))?;

        let mut grids: Vec<(&Node, Vec<usize>)> = Vec::new();
        for (node, rel_path) in container_node.walk() {
            if self.adapter.is_grid(node) {
                grids.push((node, rel_path));
            }
        }
        let total = grids.len();
        let (grid_node, grid_path) = grids.into_iter().nth(self.grid_index).ok_or_else(|| {
            EngineError::GridNotFound(format!(
                "grid index {} out of range ({} grids visible)",
                self.grid_index, total
            ))
        })?;
        let grid_id = grid_node
            .attr("id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}#grid{}", container.id, self.grid_index));

        Ok(GridView {
            snapshot,
            container,
            grid_path,
            grid_id,
        })
    }

    // ----- header resolution -----

    /// Column index for a spec, rebuilt from the live header row. A miss is
    /// retried once against freshly re-read headers: the grid may still be
    /// materializing its header row.
    async fn resolve_column(
        &self,
        column: &ColumnSpec,
        disambiguator: Option<&(String, usize)>,
    ) -> Result<usize, EngineError> {
        let (name, occurrence) = match disambiguator {
            Some((name, occurrence)) => (name.clone(), *occurrence),
            None => (column.name.clone(), column.occurrence),
        };
        let wanted = normalize_label(&name);

        for attempt in 0..2 {
            let view = self.view().await?;
            let map = self.header_map(view.grid_node());
            if let Some(indices) = map.get(&wanted) {
                return indices.get(occurrence.max(1) - 1).copied().ok_or_else(|| {
                    EngineError::ColumnNotFound(format!(
                        "column '{}' occurrence {} (only {} present)",
                        name,
                        occurrence,
                        indices.len()
                    ))
                });
            }
            if attempt == 0 {
                debug!(column = %name, "column not in headers yet, re-reading");
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }
        Err(EngineError::ColumnNotFound(name))
    }

    /// `lowercased header text -> column indices`, one entry per occurrence
    /// in header order.
    fn header_map(&self, grid_node: &Node) -> HashMap<String, Vec<usize>> {
        let mut map: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, (cell, _)) in self.adapter.header_cells(grid_node).iter().enumerate() {
            let name = normalize_label(&cell.deep_text());
            map.entry(name).or_default().push(index);
        }
        map
    }

    // ----- row materialization -----

    /// Create one new row: select the last row, send a move-down, and poll
    /// until the grid confirms the extra row. Virtualized grids can drop a
    /// freshly created row off-screen; when the newest row id falls behind
    /// the remembered counter, rows are re-created until caught up.
    async fn create_row(&self) -> Result<usize, EngineError> {
        let deadline = Instant::now() + self.config.operation_timeout;

        loop {
            let view = self.view().await?;
            let grid_node = view.grid_node();
            let rows = self.adapter.data_rows(grid_node);
            let before = rows.len();
            let remembered = self.store.row_counter(&view.grid_id);

            let last_row = rows.last().ok_or_else(|| {
                EngineError::GridNotFound("cannot create a row in a grid with no seed row".into())
            })?;
            let last_id = self.adapter.row_id(last_row.0).unwrap_or(before as i64);
            let row_ref = view.node_ref(&last_row.1);

            self.driver.click(&row_ref, ClickKind::Single).await?;
            self.driver.send_key(&row_ref, Key::Down).await?;

            // Poll for the grid to confirm the new row.
            let confirmed = self
                .poll_until(deadline, |view| {
                    let rows = self.adapter.data_rows(view.grid_node());
                    let grew = rows.len() > before;
                    let id_moved = rows
                        .last()
                        .and_then(|(node, _)| self.adapter.row_id(node))
                        .is_some_and(|id| id > last_id);
                    grew || id_moved
                })
                .await?;
            if !confirmed {
                return Err(EngineError::Timeout(format!(
                    "grid '{}' never confirmed a new row",
                    view.grid_id
                )));
            }

            let view = self.view().await?;
            let rows = self.adapter.data_rows(view.grid_node());
            let newest_id = rows
                .last()
                .and_then(|(node, _)| self.adapter.row_id(node))
                .unwrap_or(rows.len() as i64);

            if newest_id < remembered {
                // The grid scrolled and discarded the row we had already
                // materialized; keep creating until the ids catch up.
                debug!(
                    newest_id,
                    remembered,
                    grid = %view.grid_id,
                    "created row was lost off-screen, recreating"
                );
                if Instant::now() >= deadline {
                    return Err(EngineError::Timeout(format!(
                        "grid '{}' kept losing created rows (newest id {}, counter {})",
                        view.grid_id, newest_id, remembered
                    )));
                }
                continue;
            }

            self.store.advance_row_counter(&view.grid_id, newest_id);
            return Ok(rows.len());
        }
    }

    /// Re-snapshot until the predicate holds or the deadline passes.
    async fn poll_until(
        &self,
        deadline: Instant,
        predicate: impl Fn(&GridView) -> bool,
    ) -> Result<bool, EngineError> {
        loop {
            let view = self.view().await?;
            if predicate(&view) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // ----- cell edit protocol -----

    async fn apply_input(&self, input: &PendingInput) -> Result<(), EngineError> {
        if input.options.new_row {
            self.create_row().await?;
        }

        let column_index = self
            .resolve_column(&input.column, input.options.disambiguator.as_ref())
            .await?;
        let row_index = match input.options.row_index {
            Some(explicit) => explicit,
            None => {
                let view = self.view().await?;
                self.adapter.data_rows(view.grid_node()).len().max(1)
            }
        };

        self.set_cell(row_index, column_index, &input.value, !input.options.no_verify)
            .await
    }

    /// Write one cell through the inline editor.
    async fn set_cell(
        &self,
        row_index: usize,
        column_index: usize,
        value: &str,
        verify: bool,
    ) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let mut last_read = String::new();

        loop {
            let cell_ref = {
                let view = self.view().await?;
                self.cell_ref(&view, row_index, column_index)?
            };

            // (1) Bring the cell on screen, (2) select it and verify the
            // selection actually landed before editing.
            self.scroll_into_view(&cell_ref).await?;
            self.select_cell(&cell_ref, row_index, column_index, deadline)
                .await?;

            // (3) Open the inline editor and (4) see what kind opened.
            // A text editor may truncate to its declared length; the
            // read-back must compare against what was actually typed.
            let mut expected = value.to_string();
            if let Some((editor_ref, kind, declared)) =
                self.open_editor(&cell_ref, deadline).await?
            {
                // (5)–(6) drive the editor.
                match kind {
                    EditorKind::Text => {
                        expected = self.edit_text_cell(&editor_ref, value, declared).await?;
                    }
                    EditorKind::Dropdown => {
                        self.edit_dropdown_cell(&editor_ref, value).await?;
                    }
                    EditorKind::Memo => {
                        self.edit_memo_cell(value, deadline).await?;
                    }
                }
            }

            if !verify {
                return Ok(());
            }

            // (7) Re-read the cell and compare against the normalized
            // target.
            let view = self.view().await?;
            if let Ok(cell_node) = self.cell_node(&view, row_index, column_index) {
                last_read = cell_node.deep_text();
                if values_match(&expected, &last_read, ValueKind::infer(&expected)) {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(EngineError::ValueMismatch {
                    expected,
                    actual: last_read,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn scroll_into_view(&self, cell_ref: &NodeRef) -> Result<(), EngineError> {
        self.driver
            .run_script(
                "arguments[0].scrollIntoView({block: 'nearest'});",
                &[serde_json::to_value(cell_ref)
                    .map_err(|e| EngineError::Internal(e.to_string()))?],
            )
            .await?;
        Ok(())
    }

    /// Click the cell until the grid marks it (or its row) selected.
    async fn select_cell(
        &self,
        cell_ref: &NodeRef,
        row_index: usize,
        column_index: usize,
        deadline: Instant,
    ) -> Result<(), EngineError> {
        loop {
            self.driver.click(cell_ref, ClickKind::Single).await?;
            let view = self.view().await?;
            let selected = self
                .cell_node(&view, row_index, column_index)
                .map(|cell| {
                    self.adapter.is_selected(cell)
                        || self
                            .row_node(&view, row_index)
                            .is_ok_and(|row| self.adapter.is_selected(row))
                })
                .unwrap_or(false);
            if selected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout(format!(
                    "cell ({row_index}, {column_index}) never reported selection"
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Click + Enter until a focused editor widget appears. The editor
    /// sometimes needs two attempts; that retry is part of the protocol,
    /// bounded by the operation deadline.
    async fn open_editor(
        &self,
        cell_ref: &NodeRef,
        deadline: Instant,
    ) -> Result<Option<(NodeRef, EditorKind, Option<usize>)>, EngineError> {
        loop {
            self.driver.click(cell_ref, ClickKind::Single).await?;
            self.driver.send_key(cell_ref, Key::Enter).await?;

            let snapshot = self.driver.snapshot(&self.frame).await?;
            if let Some((node, path)) = self.adapter.focused_node(&snapshot.root) {
                if let Some(kind) = self.adapter.editor_kind(node) {
                    let declared = self.adapter.declared_length(node);
                    return Ok(Some((
                        NodeRef::new(snapshot.frame.clone(), path),
                        kind,
                        declared,
                    )));
                }
            }
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout(
                    "inline editor never opened".to_string(),
                ));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Select-all + type through the same strategy ladder field input
    /// uses, with mask-aware truncation to the field's declared length.
    /// Enter is skipped when the value exactly fills the field: those
    /// editors auto-advance and a second Enter would commit the next cell
    /// instead. Returns the string actually typed.
    async fn edit_text_cell(
        &self,
        editor_ref: &NodeRef,
        value: &str,
        declared: Option<usize>,
    ) -> Result<String, EngineError> {
        let typed = truncate_to_length(value, declared);
        let fills_field = declared.is_some_and(|max| typed.chars().count() == max);

        for strategy in INPUT_STRATEGIES {
            self.driver.send_key(editor_ref, Key::SelectAll).await?;
            self.driver.send_key(editor_ref, Key::Delete).await?;
            match strategy {
                InputStrategy::Burst => self.driver.type_keys(editor_ref, &typed).await?,
                InputStrategy::PerCharacter => {
                    for ch in typed.chars() {
                        self.driver.type_keys(editor_ref, &ch.to_string()).await?;
                    }
                }
                InputStrategy::Script => {
                    self.driver
                        .run_script(
                            "arguments[0].value = arguments[1]; \
                             arguments[0].dispatchEvent(new Event('change', {bubbles: true}));",
                            &[
                                serde_json::to_value(editor_ref)
                                    .map_err(|e| EngineError::Internal(e.to_string()))?,
                                serde_json::Value::String(typed.clone()),
                            ],
                        )
                        .await?;
                }
            }
            if fills_field {
                // The editor auto-committed; the cell read-back decides.
                return Ok(typed);
            }
            let displayed = self.driver.read_value(editor_ref).await?;
            if values_match(&typed, &displayed, ValueKind::infer(&typed)) {
                break;
            }
            debug!(
                strategy = strategy.name(),
                displayed = %displayed,
                "editor dropped the keystrokes, trying next strategy"
            );
        }

        self.driver.send_key(editor_ref, Key::Enter).await?;
        Ok(typed)
    }

    /// Pick the option whose text starts with the target.
    async fn edit_dropdown_cell(
        &self,
        editor_ref: &NodeRef,
        value: &str,
    ) -> Result<(), EngineError> {
        let wanted = value.trim().to_lowercase();
        let snapshot = self.driver.snapshot(&self.frame).await?;
        let editor_node = snapshot
            .node_at(&editor_ref.path)
            .ok_or_else(|| EngineError::Internal("editor path vanished".into()))?;
        let option = self
            .adapter
            .option_nodes(editor_node)
            .into_iter()
            .find(|(node, _)| node.deep_text().trim().to_lowercase().starts_with(&wanted))
            .ok_or_else(|| {
                EngineError::ElementNotFound(format!("no dropdown option starting with '{value}'"))
            })?;
        let mut path = editor_ref.path.clone();
        path.extend(option.1);
        self.driver
            .click(&NodeRef::new(editor_ref.frame.clone(), path), ClickKind::Single)
            .await?;
        Ok(())
    }

    /// A memo cell opens a modal sub-dialog that must be confirmed and
    /// closed before the outer grid regains focus.
    async fn edit_memo_cell(&self, value: &str, deadline: Instant) -> Result<(), EngineError> {
        loop {
            let snapshot = self.driver.snapshot(&self.frame).await?;
            let dialog = active_container(&snapshot, self.adapter.as_ref())
                .ok_or_else(|| EngineError::Internal("memo dialog vanished".into()))?;
            let dialog_node = snapshot
                .node_at(&dialog.path)
                .ok_or_else(|| EngineError::Internal("memo dialog path vanished".into()))?;

            let memo_input = dialog_node.walk().skip(1).find(|(node, _)| {
                matches!(self.adapter.editor_kind(node), Some(EditorKind::Memo))
                    || self.adapter.is_input_capable(node)
            });
            let confirm = dialog_node.walk().skip(1).find(|(node, _)| {
                self.adapter.is_button(node)
                    && self
                        .adapter
                        .label_text(node)
                        .is_some_and(|t| normalize_label(&t) == "ok")
            });

            if let (Some((_, input_path)), Some((_, confirm_path))) = (memo_input, confirm) {
                let input_ref = join_ref(&snapshot, &dialog.path, &input_path);
                let confirm_ref = join_ref(&snapshot, &dialog.path, &confirm_path);
                self.driver.click(&input_ref, ClickKind::Single).await?;
                self.driver.send_key(&input_ref, Key::SelectAll).await?;
                self.driver.send_key(&input_ref, Key::Delete).await?;
                self.driver.type_keys(&input_ref, value).await?;
                self.driver.click(&confirm_ref, ClickKind::Single).await?;
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(EngineError::Timeout(
                    "memo dialog never offered an input and confirm button".to_string(),
                ));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // ----- checks -----

    async fn apply_check(&self, check: &PendingCheck) -> Result<(), EngineError> {
        // An explicit row index is validated against the live row count
        // before anything else is touched.
        if let Some(requested) = check.row_index {
            let view = self.view().await?;
            let rows = self.adapter.data_rows(view.grid_node()).len();
            if requested == 0 || requested > rows {
                return Err(EngineError::RowOutOfRange { requested, rows });
            }
        }

        let column_index = self
            .resolve_column(&check.column, check.disambiguator.as_ref())
            .await?;
        let deadline = Instant::now() + self.config.operation_timeout;
        let mut last_read = String::new();

        loop {
            let view = self.view().await?;
            let rows = self.adapter.data_rows(view.grid_node());

            // Range validation happens before any cell read.
            let row_index = match check.row_index {
                Some(requested) => {
                    if requested == 0 || requested > rows.len() {
                        return Err(EngineError::RowOutOfRange {
                            requested,
                            rows: rows.len(),
                        });
                    }
                    requested
                }
                None => {
                    rows.iter()
                        .position(|(node, _)| self.adapter.is_selected(node))
                        .map(|i| i + 1)
                        .unwrap_or(rows.len().max(1))
                }
            };

            if let Ok(cell) = self.cell_node(&view, row_index, column_index) {
                // Color-coded status cells compare by canonical color name
                // instead of text.
                last_read = self
                    .adapter
                    .status_color(cell)
                    .unwrap_or_else(|| cell.deep_text());
                if values_match(&check.expected, &last_read, ValueKind::infer(&check.expected)) {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(EngineError::ValueMismatch {
                    expected: check.expected.clone(),
                    actual: last_read,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    // ----- node addressing -----

    fn row_node<'a>(&self, view: &'a GridView, row_index: usize) -> Result<&'a Node, EngineError> {
        let rows = self.adapter.data_rows(view.grid_node());
        let total = rows.len();
        rows.into_iter()
            .nth(row_index.max(1) - 1)
            .map(|(node, _)| node)
            .ok_or(EngineError::RowOutOfRange {
                requested: row_index,
                rows: total,
            })
    }

    fn cell_node<'a>(
        &self,
        view: &'a GridView,
        row_index: usize,
        column_index: usize,
    ) -> Result<&'a Node, EngineError> {
        let row = self.row_node(view, row_index)?;
        self.adapter
            .row_cells(row)
            .into_iter()
            .nth(column_index)
            .map(|(node, _)| node)
            .ok_or_else(|| {
                EngineError::ColumnNotFound(format!("row {row_index} has no cell {column_index}"))
            })
    }

    fn cell_ref(
        &self,
        view: &GridView,
        row_index: usize,
        column_index: usize,
    ) -> Result<NodeRef, EngineError> {
        let rows = self.adapter.data_rows(view.grid_node());
        let total = rows.len();
        let (row_node, row_path) =
            rows.into_iter()
                .nth(row_index.max(1) - 1)
                .ok_or(EngineError::RowOutOfRange {
                    requested: row_index,
                    rows: total,
                })?;
        let (_, cell_path) = self
            .adapter
            .row_cells(row_node)
            .into_iter()
            .nth(column_index)
            .ok_or_else(|| {
                EngineError::ColumnNotFound(format!("row {row_index} has no cell {column_index}"))
            })?;
        let mut rel = row_path;
        rel.extend(cell_path);
        Ok(view.node_ref(&rel))
    }
}

fn join_ref(snapshot: &Snapshot, base: &[usize], rel: &[usize]) -> NodeRef {
    let mut path = base.to_vec();
    path.extend_from_slice(rel);
    NodeRef::new(snapshot.frame.clone(), path)
}
