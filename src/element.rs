//! Resolved elements: a snapshot node paired with the ability to act on it.
//!
//! A [`ResolvedElement`] does not hold a live browser handle. It carries the
//! node's resolve-on-demand identity ([`NodeRef`]) plus the diagnostics
//! captured at resolution time; every interaction goes through the driver,
//! which re-resolves the reference against the live page immediately before
//! acting. Holding one across a wait is safe — it re-resolves — but callers
//! should re-locate after anything that replaces the container.

use std::fmt;
use std::sync::Arc;

use crate::driver::{ClickKind, Driver, Key};
use crate::errors::EngineError;
use crate::snapshot::{NodeRef, Rect};

#[derive(Clone)]
pub struct ResolvedElement {
    driver: Arc<dyn Driver>,
    node_ref: NodeRef,
    container_id: String,
    tag: String,
    label: Option<String>,
    internal_name: Option<String>,
    rect: Option<Rect>,
}

impl ResolvedElement {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        node_ref: NodeRef,
        container_id: String,
        tag: String,
        label: Option<String>,
        internal_name: Option<String>,
        rect: Option<Rect>,
    ) -> Self {
        Self {
            driver,
            node_ref,
            container_id,
            tag,
            label,
            internal_name,
            rect,
        }
    }

    pub fn node_ref(&self) -> &NodeRef {
        &self.node_ref
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn internal_name(&self) -> Option<&str> {
        self.internal_name.as_deref()
    }

    /// Bounding box captured at resolution time, when the snapshot had one.
    pub fn captured_rect(&self) -> Option<Rect> {
        self.rect
    }

    pub async fn click(&self) -> Result<(), EngineError> {
        self.driver.click(&self.node_ref, ClickKind::Single).await
    }

    pub async fn double_click(&self) -> Result<(), EngineError> {
        self.driver.click(&self.node_ref, ClickKind::Double).await
    }

    pub async fn right_click(&self) -> Result<(), EngineError> {
        self.driver.click(&self.node_ref, ClickKind::Right).await
    }

    pub async fn type_keys(&self, text: &str) -> Result<(), EngineError> {
        self.driver.type_keys(&self.node_ref, text).await
    }

    pub async fn send_key(&self, key: Key) -> Result<(), EngineError> {
        self.driver.send_key(&self.node_ref, key).await
    }

    /// The value the widget currently displays, re-read from the live page.
    pub async fn read_value(&self) -> Result<String, EngineError> {
        self.driver.read_value(&self.node_ref).await
    }

    pub async fn bounding_box(&self) -> Result<Rect, EngineError> {
        self.driver.bounding_box(&self.node_ref).await
    }
}

impl fmt::Debug for ResolvedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("ResolvedElement");
        debug_struct.field("node_ref", &self.node_ref.to_string());
        debug_struct.field("tag", &self.tag);
        if let Some(ref label) = self.label {
            debug_struct.field("label", label);
        }
        if let Some(ref name) = self.internal_name {
            debug_struct.field("internal_name", name);
        }
        debug_struct.field("container", &self.container_id);
        debug_struct.finish()
    }
}
