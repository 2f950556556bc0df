//! Session-scoped mutable state.
//!
//! The engine keeps two small pieces of state across calls: the highest row
//! id it has materialized per grid, and which label→widget pairings it has
//! already consumed inside the current container. Both live here, keyed by
//! stable identifiers, and reset at container-change boundaries. Only the
//! single controlling thread touches the store; the mutex exists so the
//! session can be `Send + Sync`, not for contention.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreInner {
    active_container: Option<String>,
    row_counters: HashMap<String, i64>,
    consumed_labels: HashMap<String, Vec<Vec<usize>>>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<StoreInner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which container the session is working in. Moving to a new
    /// container invalidates the consumed-label map but keeps grid row
    /// counters, which are keyed by grid identity and survive re-renders.
    pub fn note_container(&self, container_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active_container.as_deref() != Some(container_id) {
            if inner.active_container.is_some() {
                debug!(container = container_id, "container changed, resetting consumed labels");
            }
            inner.active_container = Some(container_id.to_string());
            inner.consumed_labels.clear();
        }
    }

    pub fn row_counter(&self, grid_id: &str) -> i64 {
        let inner = self.inner.lock().unwrap();
        inner.row_counters.get(grid_id).copied().unwrap_or(0)
    }

    /// Advance the remembered highest row id. Monotone: a lower value never
    /// replaces a higher one, which is how the engine notices that a
    /// virtualized grid dropped a row it had already created.
    pub fn advance_row_counter(&self, grid_id: &str, row_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.row_counters.entry(grid_id.to_string()).or_insert(0);
        if row_id > *entry {
            *entry = row_id;
        }
    }

    /// Paths already matched for this label in the current container.
    pub fn consumed_paths(&self, label: &str) -> Vec<Vec<usize>> {
        let inner = self.inner.lock().unwrap();
        inner.consumed_labels.get(label).cloned().unwrap_or_default()
    }

    /// Mark a label→widget pairing as used so a repeated request for the
    /// same text moves on to the next candidate.
    pub fn consume_label(&self, label: &str, widget_path: Vec<usize>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .consumed_labels
            .entry(label.to_string())
            .or_default()
            .push(widget_path);
    }

    /// Full reset, used when the caller restarts the remote session.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active_container = None;
        inner.row_counters.clear();
        inner.consumed_labels.clear();
    }
}
