//! Markup-flavor polymorphism.
//!
//! The application under test renders two DOM flavors: legacy flat markup
//! (class-tagged divs) and a shadow-tree widget flavor (custom `wa-*`
//! elements, expanded into the snapshot by the provider). The engine is
//! written once against [`DomAdapter`]; the two implementations hold all
//! flavor knowledge so nothing above this module branches on markup.
//!
//! All operations are pure functions over snapshot nodes. Child paths are
//! returned relative to the node passed in; callers join them onto the
//! node's absolute path to build a [`crate::NodeRef`].

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::snapshot::Node;

/// What kind of inline editor a grid cell opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKind {
    /// Single-line text input.
    Text,
    /// Multi-line memo; opens a modal sub-dialog.
    Memo,
    /// Dropdown selection list.
    Dropdown,
}

pub trait DomAdapter: Send + Sync {
    /// Short name used in diagnostics.
    fn flavor(&self) -> &'static str;

    fn is_container(&self, node: &Node) -> bool;

    /// An auxiliary vector-graphics layer that matches the container
    /// selector set but can never host widgets.
    fn is_artifact_layer(&self, node: &Node) -> bool;

    /// Whether the container currently shows the application's busy signal.
    fn is_blocked(&self, container: &Node) -> bool;

    fn container_title(&self, container: &Node) -> String;

    /// The label text a node carries, if it is a text-bearing node the
    /// locator should consider.
    fn label_text(&self, node: &Node) -> Option<String>;

    /// The application-internal field name, when the node advertises one.
    fn internal_name<'a>(&self, node: &'a Node) -> Option<&'a str>;

    fn is_input_capable(&self, node: &Node) -> bool;

    /// Toggle widgets (checkbox/radio) take clicks, not text.
    fn is_toggle(&self, node: &Node) -> bool;

    fn is_toggled(&self, node: &Node) -> bool;

    /// Combo-style widgets take option selection, not text.
    fn is_choice(&self, node: &Node) -> bool;

    fn is_button(&self, node: &Node) -> bool;

    fn is_grid(&self, node: &Node) -> bool;

    /// Header cells of a grid, in column order.
    fn header_cells<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)>;

    /// Data rows of a grid, in visual order.
    fn data_rows<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)>;

    fn row_cells<'a>(&self, row: &'a Node) -> Vec<(&'a Node, Vec<usize>)>;

    fn is_selected(&self, node: &Node) -> bool;

    /// Stable row id assigned by the grid when the row was materialized.
    fn row_id(&self, row: &Node) -> Option<i64>;

    /// The currently focused node, searched from the given root.
    fn focused_node<'a>(&self, root: &'a Node) -> Option<(&'a Node, Vec<usize>)>;

    fn editor_kind(&self, node: &Node) -> Option<EditorKind>;

    /// Declared maximum content length of an input, when present.
    fn declared_length(&self, node: &Node) -> Option<usize>;

    /// Options of a choice widget, in list order.
    fn option_nodes<'a>(&self, widget: &'a Node) -> Vec<(&'a Node, Vec<usize>)>;

    /// Canonical color name of a style-encoded status cell.
    fn status_color(&self, cell: &Node) -> Option<String>;
}

/// Legacy flat markup: everything is a div carrying widget classes.
#[derive(Debug, Default)]
pub struct LegacyAdapter;

/// Shadow-tree widget flavor: custom `wa-*` elements.
#[derive(Debug, Default)]
pub struct ShadowAdapter;

static COLOR_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("#00ff00", "green"),
        ("#008000", "green"),
        ("rgb(0, 255, 0)", "green"),
        ("rgb(0, 128, 0)", "green"),
        ("green", "green"),
        ("#ff0000", "red"),
        ("rgb(255, 0, 0)", "red"),
        ("red", "red"),
        ("#ffff00", "yellow"),
        ("rgb(255, 255, 0)", "yellow"),
        ("yellow", "yellow"),
        ("#0000ff", "blue"),
        ("rgb(0, 0, 255)", "blue"),
        ("blue", "blue"),
        ("#808080", "gray"),
        ("rgb(128, 128, 128)", "gray"),
        ("gray", "gray"),
        ("grey", "gray"),
    ])
});

/// Normalize a style-encoded color to a canonical lowercase name.
pub fn canonical_color(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    COLOR_NAMES.get(trimmed.as_str()).map(|s| s.to_string())
}

fn style_property<'a>(node: &'a Node, property: &str) -> Option<&'a str> {
    let style = node.attr("style")?;
    for declaration in style.split(';') {
        let mut parts = declaration.splitn(2, ':');
        if parts.next()?.trim() == property {
            return parts.next().map(|v| v.trim());
        }
    }
    None
}

fn collect_matching<'a>(
    root: &'a Node,
    keep: impl Fn(&Node) -> bool,
    skip_into: impl Fn(&Node) -> bool,
) -> Vec<(&'a Node, Vec<usize>)> {
    let mut out = Vec::new();
    let mut stack: Vec<(&'a Node, Vec<usize>)> = vec![(root, Vec::new())];
    while let Some((node, path)) = stack.pop() {
        if !path.is_empty() {
            // Nested widgets of the same kind keep their structure to
            // themselves.
            if skip_into(node) {
                continue;
            }
            if keep(node) {
                out.push((node, path.clone()));
            }
        }
        for (index, child) in node.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(index);
            stack.push((child, child_path));
        }
    }
    out
}

impl DomAdapter for LegacyAdapter {
    fn flavor(&self) -> &'static str {
        "legacy"
    }

    fn is_container(&self, node: &Node) -> bool {
        node.has_class("tmodaldialog") || node.has_class("twindow")
    }

    fn is_artifact_layer(&self, node: &Node) -> bool {
        node.tag.eq_ignore_ascii_case("svg") || node.has_class("tsvg")
    }

    fn is_blocked(&self, container: &Node) -> bool {
        if container.attr("blocked").is_some_and(|v| v != "false") {
            return true;
        }
        container
            .walk()
            .any(|(n, _)| n.has_class("tblockui") && n.is_visible())
    }

    fn container_title(&self, container: &Node) -> String {
        container
            .walk()
            .find(|(n, _)| n.has_class("ttitlebar") || n.has_class("tsay-title"))
            .map(|(n, _)| n.deep_text())
            .or_else(|| container.attr("title").map(|t| t.to_string()))
            .unwrap_or_default()
    }

    fn label_text(&self, node: &Node) -> Option<String> {
        if node.has_class("tsay") || node.tag == "label" || node.has_class("tbutton") {
            let text = node.deep_text();
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    fn internal_name<'a>(&self, node: &'a Node) -> Option<&'a str> {
        node.attr("name")
    }

    fn is_input_capable(&self, node: &Node) -> bool {
        node.has_class("tget")
            || node.has_class("tmultiget")
            || node.has_class("tcombobox")
            || node.has_class("tcheckbox")
            || node.tag == "input"
            || node.tag == "textarea"
            || node.tag == "select"
    }

    fn is_toggle(&self, node: &Node) -> bool {
        node.has_class("tcheckbox") || node.attr("type").is_some_and(|t| t == "checkbox")
    }

    fn is_toggled(&self, node: &Node) -> bool {
        node.attr("checked").is_some_and(|v| v != "false")
    }

    fn is_choice(&self, node: &Node) -> bool {
        node.has_class("tcombobox") || node.tag == "select"
    }

    fn is_button(&self, node: &Node) -> bool {
        node.has_class("tbutton") || node.has_class("tbrowsebutton") || node.tag == "button"
    }

    fn is_grid(&self, node: &Node) -> bool {
        node.has_class("tgetdados") || node.has_class("tgrid") || node.has_class("tcbrowse")
    }

    fn header_cells<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(grid, |n| n.tag == "th", |n| self.is_grid(n))
    }

    fn data_rows<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(
            grid,
            |n| n.tag == "tr" && !n.children.iter().any(|c| c.tag == "th"),
            |n| self.is_grid(n),
        )
    }

    fn row_cells<'a>(&self, row: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        row.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.tag == "td")
            .map(|(i, c)| (c, vec![i]))
            .collect()
    }

    fn is_selected(&self, node: &Node) -> bool {
        node.has_class("selected") || node.attr("selected").is_some_and(|v| v != "false")
    }

    fn row_id(&self, row: &Node) -> Option<i64> {
        row.attr("data-row-id").and_then(|v| v.parse().ok())
    }

    fn focused_node<'a>(&self, root: &'a Node) -> Option<(&'a Node, Vec<usize>)> {
        root.walk()
            .find(|(n, _)| n.has_class("focused") || n.attr("focused").is_some_and(|v| v != "false"))
    }

    fn editor_kind(&self, node: &Node) -> Option<EditorKind> {
        if self.is_choice(node) {
            Some(EditorKind::Dropdown)
        } else if node.tag == "textarea" || node.has_class("tmultiget") {
            Some(EditorKind::Memo)
        } else if self.is_input_capable(node) {
            Some(EditorKind::Text)
        } else {
            None
        }
    }

    fn declared_length(&self, node: &Node) -> Option<usize> {
        node.attr("maxlength").and_then(|v| v.parse().ok())
    }

    fn option_nodes<'a>(&self, widget: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(
            widget,
            |n| n.tag == "option" || n.has_class("titem"),
            |_| false,
        )
    }

    fn status_color(&self, cell: &Node) -> Option<String> {
        let raw = style_property(cell, "background-color").or_else(|| style_property(cell, "color"));
        raw.and_then(canonical_color)
    }
}

impl DomAdapter for ShadowAdapter {
    fn flavor(&self) -> &'static str {
        "shadow"
    }

    fn is_container(&self, node: &Node) -> bool {
        node.tag == "wa-dialog" || node.tag == "wa-panel-window"
    }

    fn is_artifact_layer(&self, node: &Node) -> bool {
        node.tag == "wa-image-layer" || node.tag.eq_ignore_ascii_case("svg")
    }

    fn is_blocked(&self, container: &Node) -> bool {
        if container.attr("blocked").is_some_and(|v| v != "false") {
            return true;
        }
        container
            .walk()
            .any(|(n, _)| n.tag == "wa-loading" && n.is_visible())
    }

    fn container_title(&self, container: &Node) -> String {
        container
            .attr("title")
            .map(|t| t.to_string())
            .or_else(|| {
                container
                    .walk()
                    .find(|(n, _)| n.tag == "wa-dialog-header")
                    .map(|(n, _)| n.deep_text())
            })
            .unwrap_or_default()
    }

    fn label_text(&self, node: &Node) -> Option<String> {
        if node.tag == "wa-text-view" || node.tag == "label" || node.tag == "wa-button" {
            let text = node
                .attr("caption")
                .map(|c| c.to_string())
                .unwrap_or_else(|| node.deep_text());
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    fn internal_name<'a>(&self, node: &'a Node) -> Option<&'a str> {
        node.attr("name")
    }

    fn is_input_capable(&self, node: &Node) -> bool {
        matches!(
            node.tag.as_str(),
            "wa-text-input" | "wa-multiline" | "wa-combobox" | "wa-checkbox"
        )
    }

    fn is_toggle(&self, node: &Node) -> bool {
        node.tag == "wa-checkbox" || node.tag == "wa-radio"
    }

    fn is_toggled(&self, node: &Node) -> bool {
        node.attr("checked").is_some_and(|v| v != "false")
    }

    fn is_choice(&self, node: &Node) -> bool {
        node.tag == "wa-combobox"
    }

    fn is_button(&self, node: &Node) -> bool {
        node.tag == "wa-button"
    }

    fn is_grid(&self, node: &Node) -> bool {
        node.tag == "wa-grid" || node.tag == "wa-tgrid"
    }

    fn header_cells<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(
            grid,
            |n| n.tag == "th" || n.tag == "wa-grid-header-cell",
            |n| self.is_grid(n),
        )
    }

    fn data_rows<'a>(&self, grid: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(
            grid,
            |n| {
                (n.tag == "tr" || n.tag == "wa-grid-row")
                    && !n
                        .children
                        .iter()
                        .any(|c| c.tag == "th" || c.tag == "wa-grid-header-cell")
            },
            |n| self.is_grid(n),
        )
    }

    fn row_cells<'a>(&self, row: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        row.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.tag == "td" || c.tag == "wa-grid-cell")
            .map(|(i, c)| (c, vec![i]))
            .collect()
    }

    fn is_selected(&self, node: &Node) -> bool {
        node.attr("selected").is_some_and(|v| v != "false") || node.has_class("selected")
    }

    fn row_id(&self, row: &Node) -> Option<i64> {
        row.attr("data-row-id").and_then(|v| v.parse().ok())
    }

    fn focused_node<'a>(&self, root: &'a Node) -> Option<(&'a Node, Vec<usize>)> {
        root.walk()
            .find(|(n, _)| n.attr("focused").is_some_and(|v| v != "false"))
    }

    fn editor_kind(&self, node: &Node) -> Option<EditorKind> {
        match node.tag.as_str() {
            "wa-combobox" => Some(EditorKind::Dropdown),
            "wa-multiline" => Some(EditorKind::Memo),
            "wa-text-input" => Some(EditorKind::Text),
            _ => None,
        }
    }

    fn declared_length(&self, node: &Node) -> Option<usize> {
        node.attr("maxlength").and_then(|v| v.parse().ok())
    }

    fn option_nodes<'a>(&self, widget: &'a Node) -> Vec<(&'a Node, Vec<usize>)> {
        collect_matching(
            widget,
            |n| n.tag == "option" || n.tag == "wa-option",
            |_| false,
        )
    }

    fn status_color(&self, cell: &Node) -> Option<String> {
        cell.attr("status-color")
            .and_then(canonical_color)
            .or_else(|| {
                style_property(cell, "background-color")
                    .or_else(|| style_property(cell, "color"))
                    .and_then(canonical_color)
            })
    }
}
