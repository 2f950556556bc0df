//! The contract consumed from the snapshot provider / browser layer.
//!
//! The engine never talks to a browser directly: everything flows through
//! [`Driver`], which captures structured snapshots and executes low-level
//! primitives against [`NodeRef`]s. The driver re-resolves each `NodeRef`
//! against the live page at call time, which is what makes the engine's
//! resolve-on-demand discipline work.

use crate::errors::EngineError;
use crate::snapshot::{FrameContext, NodeRef, Rect, Snapshot};

/// How a click should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Single,
    Double,
    Right,
}

/// Non-text keys the engine sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
    Up,
    Down,
    PageDown,
    Space,
    Delete,
    /// Select-all chord (Ctrl+A or the platform equivalent).
    SelectAll,
}

#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Capture the current rendered tree of the given frame.
    async fn snapshot(&self, frame: &FrameContext) -> Result<Snapshot, EngineError>;

    /// Deliver a click to the node.
    async fn click(&self, target: &NodeRef, kind: ClickKind) -> Result<(), EngineError>;

    /// Type text through simulated key events. One call per logical burst;
    /// the target UI sees individual key events, not a value swap.
    async fn type_keys(&self, target: &NodeRef, text: &str) -> Result<(), EngineError>;

    /// Send a single special key to the node.
    async fn send_key(&self, target: &NodeRef, key: Key) -> Result<(), EngineError>;

    /// Read the value the widget currently displays.
    async fn read_value(&self, target: &NodeRef) -> Result<String, EngineError>;

    /// Live bounding box of the node.
    async fn bounding_box(&self, target: &NodeRef) -> Result<Rect, EngineError>;

    /// Run a script in the page, returning its JSON result. Used for
    /// scroll-into-view and for traversals the structured tree does not
    /// expose directly.
    async fn run_script(
        &self,
        src: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, EngineError>;
}
