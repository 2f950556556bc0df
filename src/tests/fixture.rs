//! Test environment: a scripted snapshot provider.
//!
//! `FakeDriver` plays the part the live browser plays in production: it
//! serves snapshots of an in-memory tree and mutates that tree in response
//! to the engine's primitives the way the application under test would
//! (typing accumulates value, Enter opens inline editors, a move-down key
//! materializes a grid row, the busy overlay clears after a configured
//! number of polls).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::driver::{ClickKind, Driver, Key};
use crate::errors::EngineError;
use crate::snapshot::{FrameContext, Node, NodeRef, Rect, Snapshot};
use crate::{EngineConfig, LegacyAdapter, Session};

// ----- tree builders -----

pub fn el(tag: &str, attrs: &[(&str, &str)], text: &str, children: Vec<Node>) -> Node {
    Node {
        tag: tag.to_string(),
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        text: text.to_string(),
        children,
    }
}

pub fn with_bounds(mut node: Node, x: f64, y: f64, w: f64, h: f64) -> Node {
    node.attributes.insert("data-x".into(), x.to_string());
    node.attributes.insert("data-y".into(), y.to_string());
    node.attributes.insert("data-width".into(), w.to_string());
    node.attributes.insert("data-height".into(), h.to_string());
    node
}

pub fn page(children: Vec<Node>) -> Node {
    el("body", &[], "", children)
}

pub fn dialog(id: &str, z: i64, x: f64, y: f64, w: f64, h: f64, children: Vec<Node>) -> Node {
    let style = format!("z-index: {z}");
    with_bounds(
        el(
            "div",
            &[("class", "tmodaldialog"), ("id", id), ("style", &style)],
            "",
            children,
        ),
        x,
        y,
        w,
        h,
    )
}

pub fn label(text: &str, x: f64, y: f64, w: f64, h: f64) -> Node {
    with_bounds(el("div", &[("class", "tsay")], text, vec![]), x, y, w, h)
}

pub fn input(name: &str, x: f64, y: f64, w: f64, h: f64) -> Node {
    with_bounds(
        el("div", &[("class", "tget"), ("name", name), ("value", "")], "", vec![]),
        x,
        y,
        w,
        h,
    )
}

pub fn checkbox(name: &str, x: f64, y: f64) -> Node {
    with_bounds(
        el("div", &[("class", "tcheckbox"), ("name", name)], "", vec![]),
        x,
        y,
        16.0,
        16.0,
    )
}

pub fn combobox(name: &str, options: &[&str], x: f64, y: f64) -> Node {
    let children = options
        .iter()
        .map(|o| el("option", &[], o, vec![]))
        .collect();
    with_bounds(
        el(
            "div",
            &[("class", "tcombobox"), ("name", name), ("value", "")],
            "",
            children,
        ),
        x,
        y,
        120.0,
        24.0,
    )
}

/// A legacy grid: header row plus data rows of text-editor cells.
pub fn grid_widget(id: &str, headers: &[&str], rows: &[&[&str]]) -> Node {
    let mut children = vec![el(
        "tr",
        &[],
        "",
        headers.iter().map(|h| el("th", &[], h, vec![])).collect(),
    )];
    for (i, row) in rows.iter().enumerate() {
        let row_id = (i + 1).to_string();
        children.push(el(
            "tr",
            &[("data-row-id", &row_id)],
            "",
            row.iter()
                .map(|cell| el("td", &[("data-editor", "text")], cell, vec![]))
                .collect(),
        ));
    }
    let next_id = (rows.len() + 1).to_string();
    el(
        "table",
        &[
            ("class", "tgetdados"),
            ("id", id),
            ("data-next-row-id", &next_id),
        ],
        "",
        children,
    )
}

/// The overlay node the legacy markup shows while the server is busy.
pub fn blocker() -> Node {
    el("div", &[("class", "tblockui")], "", vec![])
}

// ----- the scripted driver -----

#[derive(Default)]
struct FakeState {
    root: Node,
    snapshots: usize,
    /// Remove blocker nodes once this many snapshots have been served.
    clear_block_after: Option<usize>,
    typed: Vec<(Vec<usize>, String)>,
    clicks: Vec<Vec<usize>>,
}

pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new(root: Node) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                root,
                ..Default::default()
            }),
        })
    }

    pub fn clear_block_after(&self, snapshots: usize) {
        self.state.lock().unwrap().clear_block_after = Some(snapshots);
    }

    pub fn typed_count(&self) -> usize {
        self.state.lock().unwrap().typed.len()
    }

    pub fn click_count(&self) -> usize {
        self.state.lock().unwrap().clicks.len()
    }

    pub fn snapshots_taken(&self) -> usize {
        self.state.lock().unwrap().snapshots
    }

    /// Mutate the scripted tree mid-test (simulates server-driven
    /// re-renders).
    pub fn mutate_tree(&self, f: impl FnOnce(&mut Node)) {
        f(&mut self.state.lock().unwrap().root);
    }
}

fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> Option<&'a mut Node> {
    let mut current = root;
    for &index in path {
        current = current.children.get_mut(index)?;
    }
    Some(current)
}

fn clear_focused(node: &mut Node) {
    node.attributes.remove("focused");
    for child in &mut node.children {
        clear_focused(child);
    }
}

fn remove_blockers(node: &mut Node) {
    node.attributes.remove("blocked");
    node.children.retain(|c| !c.has_class("tblockui"));
    for child in &mut node.children {
        remove_blockers(child);
    }
}

fn add_class(node: &mut Node, class: &str) {
    let current = node.attributes.entry("class".into()).or_default();
    if !current.split_whitespace().any(|c| c == class) {
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(class);
    }
}

fn remove_class(node: &mut Node, class: &str) {
    if let Some(current) = node.attributes.get_mut("class") {
        *current = current
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
    }
}

fn dotted(path: &[usize]) -> String {
    path.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn parse_dotted(s: &str) -> Vec<usize> {
    s.split('.').filter_map(|p| p.parse().ok()).collect()
}

fn is_toggle_node(node: &Node) -> bool {
    node.has_class("tcheckbox") || node.attr("type").is_some_and(|t| t == "checkbox")
}

fn is_choice_node(node: &Node) -> bool {
    node.has_class("tcombobox") || node.tag == "select"
}

impl FakeState {
    fn tag_at(&self, path: &[usize]) -> Option<String> {
        self.root.node_at(path).map(|n| n.tag.clone())
    }

    /// Commit an inline text editor: the cell takes the typed value and the
    /// editor closes.
    fn commit_text_editor(&mut self, input_path: &[usize]) {
        let Some((last, parent_path)) = input_path.split_last() else {
            return;
        };
        let value = self
            .root
            .node_at(input_path)
            .and_then(|n| n.attr("value"))
            .unwrap_or_default()
            .to_string();
        if let Some(td) = node_at_mut(&mut self.root, parent_path) {
            if td.tag == "td" {
                td.text = value;
                td.children.remove(*last);
            }
        }
    }

    fn open_editor(&mut self, td_path: &[usize]) {
        let Some(td) = self.root.node_at(td_path) else {
            return;
        };
        if td.tag != "td" {
            return;
        }
        // Re-focus an already open editor instead of stacking another.
        if let Some(existing) = td
            .children
            .iter()
            .position(|c| c.tag == "input" || c.tag == "select")
        {
            clear_focused(&mut self.root);
            if let Some(td) = node_at_mut(&mut self.root, td_path) {
                td.children[existing]
                    .attributes
                    .insert("focused".into(), "true".into());
            }
            return;
        }

        let kind = td.attr("data-editor").unwrap_or("text").to_string();
        let maxlength = td.attr("data-maxlength").map(|m| m.to_string());
        let drops_bursts = td.attr("data-drops-bursts").is_some();
        let options: Vec<String> = td
            .attr("data-options")
            .map(|o| o.split(';').map(|s| s.to_string()).collect())
            .unwrap_or_default();

        clear_focused(&mut self.root);
        match kind.as_str() {
            "dropdown" => {
                let children = options
                    .iter()
                    .map(|o| el("option", &[], o, vec![]))
                    .collect();
                let mut editor = el("select", &[("focused", "true")], "", children);
                if let Some(max) = maxlength {
                    editor.attributes.insert("maxlength".into(), max);
                }
                if let Some(td) = node_at_mut(&mut self.root, td_path) {
                    td.children.push(editor);
                }
            }
            "memo" => {
                let target = dotted(td_path);
                // One dialog per cell; a second Enter only refocuses it.
                if let Some(existing) = self
                    .root
                    .children
                    .iter()
                    .position(|c| c.attr("data-memo-target") == Some(target.as_str()))
                {
                    clear_focused(&mut self.root);
                    if let Some(textarea) = self.root.children[existing]
                        .children
                        .iter_mut()
                        .find(|c| c.tag == "textarea")
                    {
                        textarea.attributes.insert("focused".into(), "true".into());
                    }
                    return;
                }
                let memo = with_bounds(
                    el(
                        "div",
                        &[
                            ("class", "tmodaldialog"),
                            ("id", "memo-dialog"),
                            ("style", "z-index: 99"),
                            ("data-memo-target", &target),
                        ],
                        "",
                        vec![
                            el(
                                "textarea",
                                &[("focused", "true"), ("value", "")],
                                "",
                                vec![],
                            ),
                            el(
                                "button",
                                &[("class", "tbutton"), ("data-action", "memo-ok")],
                                "Ok",
                                vec![],
                            ),
                        ],
                    ),
                    50.0,
                    50.0,
                    300.0,
                    200.0,
                );
                self.root.children.push(memo);
            }
            _ => {
                let mut editor = el(
                    "input",
                    &[("class", "tget"), ("focused", "true"), ("value", "")],
                    "",
                    vec![],
                );
                if let Some(max) = maxlength {
                    editor.attributes.insert("maxlength".into(), max);
                }
                if drops_bursts {
                    editor
                        .attributes
                        .insert("data-drops-bursts".into(), "1".into());
                }
                if let Some(td) = node_at_mut(&mut self.root, td_path) {
                    td.children.push(editor);
                }
            }
        }
    }

    /// Append a fresh row to the grid owning the given row, the way the
    /// application materializes one on a move-down.
    fn add_row(&mut self, row_path: &[usize]) {
        let Some((_, grid_path)) = row_path.split_last() else {
            return;
        };
        let Some(grid) = self.root.node_at(grid_path) else {
            return;
        };
        if !grid.has_class("tgetdados") && !grid.has_class("tgrid") {
            return;
        }
        let next_id: i64 = grid
            .attr("data-next-row-id")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let template_cells: Vec<Node> = grid
            .children
            .iter()
            .rev()
            .find(|c| c.tag == "tr" && !c.children.iter().any(|g| g.tag == "th"))
            .map(|row| {
                row.children
                    .iter()
                    .map(|cell| {
                        let mut fresh = cell.clone();
                        fresh.text.clear();
                        fresh.children.clear();
                        fresh.attributes.remove("selected");
                        fresh
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some(grid) = node_at_mut(&mut self.root, grid_path) {
            for row in &mut grid.children {
                remove_class(row, "selected");
            }
            let mut new_row = el("tr", &[], "", template_cells);
            new_row
                .attributes
                .insert("data-row-id".into(), next_id.to_string());
            add_class(&mut new_row, "selected");
            grid.children.push(new_row);
            grid.attributes
                .insert("data-next-row-id".into(), (next_id + 1).to_string());
        }
    }

    fn select_row_and_cell(&mut self, path: &[usize]) {
        let tag = self.tag_at(path).unwrap_or_default();
        let (row_path, cell_index) = if tag == "td" {
            let (last, parent) = path.split_last().unwrap();
            (parent.to_vec(), Some(*last))
        } else {
            (path.to_vec(), None)
        };
        let Some((_, grid_path)) = row_path.split_last() else {
            return;
        };
        let grid_path = grid_path.to_vec();
        if let Some(grid) = node_at_mut(&mut self.root, &grid_path) {
            for row in &mut grid.children {
                remove_class(row, "selected");
                for cell in &mut row.children {
                    cell.attributes.remove("selected");
                }
            }
        }
        if let Some(row) = node_at_mut(&mut self.root, &row_path) {
            add_class(row, "selected");
            if let Some(index) = cell_index {
                if let Some(cell) = row.children.get_mut(index) {
                    cell.attributes.insert("selected".into(), "true".into());
                }
            }
        }
    }

    /// An option was clicked: inside a grid editor the cell takes the text
    /// and the editor closes; on a plain combobox the widget's value
    /// changes.
    fn choose_option(&mut self, option_path: &[usize]) {
        let text = self
            .root
            .node_at(option_path)
            .map(|n| n.text.clone())
            .unwrap_or_default();
        // Walk ancestors for the owning widget. A select living inside a
        // td is a grid cell editor: the cell takes the text and the editor
        // closes.
        for cut in (0..option_path.len()).rev() {
            let ancestor_path = &option_path[..cut];
            let Some(ancestor) = self.root.node_at(ancestor_path) else {
                continue;
            };
            if is_choice_node(ancestor) {
                let in_cell = cut > 0
                    && self
                        .root
                        .node_at(&option_path[..cut - 1])
                        .is_some_and(|p| p.tag == "td");
                if in_cell {
                    let td_path = option_path[..cut - 1].to_vec();
                    if let Some(td) = node_at_mut(&mut self.root, &td_path) {
                        td.text = text;
                        td.children.retain(|c| c.tag != "select");
                    }
                } else {
                    let ancestor_path = ancestor_path.to_vec();
                    if let Some(widget) = node_at_mut(&mut self.root, &ancestor_path) {
                        widget.attributes.insert("value".into(), text);
                    }
                }
                return;
            }
        }
    }

    fn confirm_memo(&mut self, button_path: &[usize]) {
        // The dialog is the button's parent.
        let Some((_, dialog_path)) = button_path.split_last() else {
            return;
        };
        let Some(dialog) = self.root.node_at(dialog_path) else {
            return;
        };
        let target = dialog
            .attr("data-memo-target")
            .map(parse_dotted)
            .unwrap_or_default();
        let value = dialog
            .children
            .iter()
            .find(|c| c.tag == "textarea")
            .and_then(|t| t.attr("value"))
            .unwrap_or_default()
            .to_string();
        let dialog_index = *dialog_path.last().unwrap();
        if let Some(td) = node_at_mut(&mut self.root, &target) {
            td.text = value;
        }
        self.root.children.remove(dialog_index);
    }
}

#[async_trait::async_trait]
impl Driver for FakeDriver {
    async fn snapshot(&self, frame: &FrameContext) -> Result<Snapshot, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.snapshots += 1;
        if let Some(after) = state.clear_block_after {
            if state.snapshots > after {
                remove_blockers(&mut state.root);
            }
        }
        Ok(Snapshot::new(frame.clone(), state.root.clone()))
    }

    async fn click(&self, target: &NodeRef, _kind: ClickKind) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(target.path.clone());

        let Some(node) = state.root.node_at(&target.path) else {
            return Err(EngineError::Driver(format!("click target gone: {target}")));
        };
        if is_toggle_node(node) {
            let path = target.path.clone();
            if let Some(node) = node_at_mut(&mut state.root, &path) {
                let checked = node.attr("checked").is_some_and(|v| v != "false");
                node.attributes
                    .insert("checked".into(), (!checked).to_string());
            }
        } else if node.tag == "option" || node.has_class("titem") {
            state.choose_option(&target.path.clone());
        } else if node.tag == "td" || node.tag == "tr" {
            state.select_row_and_cell(&target.path.clone());
        } else if node.attr("data-action") == Some("memo-ok") {
            state.confirm_memo(&target.path.clone());
        } else {
            let path = target.path.clone();
            clear_focused(&mut state.root);
            if let Some(node) = node_at_mut(&mut state.root, &path) {
                node.attributes.insert("focused".into(), "true".into());
            }
        }
        Ok(())
    }

    async fn type_keys(&self, target: &NodeRef, text: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.typed.push((target.path.clone(), text.to_string()));

        let path = target.path.clone();
        let mut reached_max = false;
        if let Some(node) = node_at_mut(&mut state.root, &path) {
            if node.attr("readonly").is_some() {
                return Ok(());
            }
            // A widget that reformats while typing swallows multi-character
            // bursts; only single key events land.
            if node.attr("data-drops-bursts").is_some() && text.chars().count() > 1 {
                node.attributes.remove("data-select-all");
                return Ok(());
            }
            let replace = node.attributes.remove("data-select-all").is_some();
            let value = node.attributes.entry("value".into()).or_default();
            if replace {
                *value = text.to_string();
            } else {
                value.push_str(text);
            }
            if let Some(max) = node
                .attr("maxlength")
                .and_then(|m| m.parse::<usize>().ok())
            {
                reached_max = node
                    .attr("value")
                    .is_some_and(|v| v.chars().count() >= max);
            }
        } else {
            return Err(EngineError::Driver(format!("type target gone: {target}")));
        }
        // Editors that fill their declared length auto-advance without an
        // Enter.
        if reached_max {
            state.commit_text_editor(&path);
        }
        Ok(())
    }

    async fn send_key(&self, target: &NodeRef, key: Key) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        let path = target.path.clone();
        match key {
            Key::SelectAll => {
                if let Some(node) = node_at_mut(&mut state.root, &path) {
                    node.attributes.insert("data-select-all".into(), "1".into());
                }
            }
            Key::Delete => {
                if let Some(node) = node_at_mut(&mut state.root, &path) {
                    let frozen = node.attr("readonly").is_some();
                    if node.attributes.remove("data-select-all").is_some() && !frozen {
                        node.attributes.insert("value".into(), String::new());
                    }
                }
            }
            Key::Enter => {
                let tag = state.tag_at(&path).unwrap_or_default();
                if tag == "td" {
                    state.open_editor(&path);
                } else if let Some((_, parent)) = path.split_last() {
                    let parent_tag = state.tag_at(parent).unwrap_or_default();
                    if parent_tag == "td" {
                        state.commit_text_editor(&path);
                    }
                }
            }
            Key::Down => {
                let tag = state.tag_at(&path).unwrap_or_default();
                if tag == "tr" {
                    state.add_row(&path);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn read_value(&self, target: &NodeRef) -> Result<String, EngineError> {
        let state = self.state.lock().unwrap();
        let node = state
            .root
            .node_at(&target.path)
            .ok_or_else(|| EngineError::Driver(format!("read target gone: {target}")))?;
        Ok(node
            .attr("value")
            .map(|v| v.to_string())
            .unwrap_or_else(|| node.text.clone()))
    }

    async fn bounding_box(&self, target: &NodeRef) -> Result<Rect, EngineError> {
        let state = self.state.lock().unwrap();
        let node = state
            .root
            .node_at(&target.path)
            .ok_or_else(|| EngineError::Driver(format!("bounds target gone: {target}")))?;
        node.rect()
            .ok_or_else(|| EngineError::Driver(format!("no bounds on {target}")))
    }

    async fn run_script(
        &self,
        src: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EngineError> {
        if src.contains("arguments[0].value") {
            let target: NodeRef = serde_json::from_value(args[0].clone())
                .map_err(|e| EngineError::Driver(e.to_string()))?;
            let value = args
                .get(1)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let mut state = self.state.lock().unwrap();
            if let Some(node) = node_at_mut(&mut state.root, &target.path) {
                if node.attr("readonly").is_none() {
                    node.attributes.insert("value".into(), value);
                }
            }
        }
        // scrollIntoView and friends are no-ops against a scripted tree.
        Ok(serde_json::Value::Null)
    }
}

// ----- session helpers -----

pub fn fast_config() -> EngineConfig {
    EngineConfig::default()
        .with_operation_timeout(Duration::from_millis(1500))
        .with_poll_interval(Duration::from_millis(10))
}

pub fn legacy_session(root: Node) -> (Arc<FakeDriver>, Session) {
    let driver = FakeDriver::new(root);
    let session = Session::with_config(
        driver.clone(),
        Arc::new(LegacyAdapter),
        fast_config(),
    );
    (driver, session)
}
