//! Immutable page snapshots.
//!
//! A [`Snapshot`] is one structured capture of the rendered page (or a
//! sub-frame). It is never mutated; when the page re-renders, callers take a
//! fresh snapshot and re-resolve whatever they were holding. Nodes are
//! addressed structurally through [`NodeRef`] paths so an element's identity
//! survives the snapshot it was found in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Which document a snapshot was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameContext {
    /// The top-level document.
    Top,
    /// A named iframe inside the top-level document.
    Frame(String),
}

impl Default for FrameContext {
    fn default() -> Self {
        FrameContext::Top
    }
}

/// Axis-aligned bounding box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Euclidean distance between the centers of two rects.
    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        let dx = ax - bx;
        let dy = ay - by;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance from a point to the nearest point of this rect. Zero when
    /// the point lies inside.
    pub fn distance_to_point(&self, px: f64, py: f64) -> f64 {
        let dx = (self.x - px).max(px - self.right()).max(0.0);
        let dy = (self.y - py).max(py - self.bottom()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Vertical band overlap, used when filtering left/right candidates.
    pub fn vertically_overlaps(&self, other: &Rect, slack: f64) -> bool {
        other.y < self.bottom() + slack && other.bottom() > self.y - slack
    }

    /// Horizontal band overlap, used when filtering above/below candidates.
    pub fn horizontally_overlaps(&self, other: &Rect, slack: f64) -> bool {
        other.x < self.right() + slack && other.right() > self.x - slack
    }
}

/// One node of a captured tree: tag, attributes, own text, children.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Node {
    pub tag: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|part| part == class))
            .unwrap_or(false)
    }

    /// Layering rank of the node. Containers without an explicit z-index
    /// rank below every container that has one.
    pub fn z_index(&self) -> i64 {
        self.attr("style")
            .and_then(style_z_index)
            .or_else(|| self.attr("z-index").and_then(|z| z.parse().ok()))
            .unwrap_or(-1)
    }

    pub fn is_visible(&self) -> bool {
        if let Some(style) = self.attr("style") {
            if style.contains("display: none")
                || style.contains("display:none")
                || style.contains("visibility: hidden")
                || style.contains("visibility:hidden")
            {
                return false;
            }
        }
        self.attr("hidden").is_none()
    }

    /// Bounding box as published by the provider on the node itself.
    /// Live geometry queries go through the driver; this is the captured
    /// value used by pure tree heuristics.
    pub fn rect(&self) -> Option<Rect> {
        let parse = |name: &str| self.attr(name).and_then(|v| v.parse::<f64>().ok());
        Some(Rect::new(
            parse("data-x")?,
            parse("data-y")?,
            parse("data-width")?,
            parse("data-height")?,
        ))
    }

    /// The node at a structural path, each step being a child index.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?;
        }
        Some(current)
    }

    /// Depth-first, document-order traversal of this node and everything
    /// under it, yielding each node with its structural path.
    pub fn walk(&self) -> NodeWalk<'_> {
        NodeWalk {
            stack: vec![(self, Vec::new())],
        }
    }

    /// Own text plus descendant text, space-joined in document order.
    pub fn deep_text(&self) -> String {
        let mut parts = Vec::new();
        for (node, _) in self.walk() {
            let trimmed = node.text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
        parts.join(" ")
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("Node");
        debug_struct.field("tag", &self.tag);
        if !self.text.is_empty() {
            debug_struct.field("text", &self.text);
        }
        if !self.attributes.is_empty() {
            debug_struct.field("attributes", &self.attributes);
        }
        if !self.children.is_empty() {
            debug_struct.field("children", &self.children.len());
        }
        debug_struct.finish()
    }
}

fn style_z_index(style: &str) -> Option<i64> {
    for declaration in style.split(';') {
        let mut parts = declaration.splitn(2, ':');
        let name = parts.next()?.trim();
        if name == "z-index" {
            return parts.next()?.trim().parse().ok();
        }
    }
    None
}

/// Iterator over a subtree in document order.
pub struct NodeWalk<'a> {
    stack: Vec<(&'a Node, Vec<usize>)>,
}

impl<'a> Iterator for NodeWalk<'a> {
    type Item = (&'a Node, Vec<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, path) = self.stack.pop()?;
        for (index, child) in node.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(index);
            self.stack.push((child, child_path));
        }
        Some((node, path))
    }
}

/// One captured tree plus the frame it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: FrameContext,
    pub root: Node,
}

impl Snapshot {
    pub fn new(frame: FrameContext, root: Node) -> Self {
        Self { frame, root }
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.text.is_empty()
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        self.root.node_at(path)
    }
}

/// Resolve-on-demand identity of a node: the frame it lives in plus its
/// structural path from the root. Interactions hand this to the driver,
/// which re-resolves it against the live page immediately before acting,
/// so a superseded snapshot never leaves us driving a stale handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub frame: FrameContext,
    pub path: Vec<usize>,
}

impl NodeRef {
    pub fn new(frame: FrameContext, path: Vec<usize>) -> Self {
        Self { frame, path }
    }

    /// A child of this node.
    pub fn child(&self, index: usize) -> NodeRef {
        let mut path = self.path.clone();
        path.push(index);
        NodeRef {
            frame: self.frame.clone(),
            path,
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = match &self.frame {
            FrameContext::Top => "top".to_string(),
            FrameContext::Frame(name) => format!("frame:{name}"),
        };
        write!(f, "{frame}/")?;
        for (i, step) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
