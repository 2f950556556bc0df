//! Resilient element resolution for asynchronously rendered enterprise UIs.
//!
//! This crate drives verified interactions against a web application that
//! re-renders fragments of its DOM unpredictably. It resolves fuzzy field
//! specifications (a label, an internal field name, a grid column) into
//! concrete widgets, waits for the application's busy signal around every
//! interaction, types values and proves they round-trip, and models grid
//! widgets whose rows must be materialized on demand.
//!
//! Browser control itself lives behind the [`Driver`] trait; markup-flavor
//! knowledge lives behind [`DomAdapter`]. The engine is written once
//! against both.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, instrument};

pub mod adapter;
pub mod assign;
pub mod config;
pub mod container;
pub mod driver;
pub mod element;
pub mod errors;
pub mod field;
pub mod grid;
pub mod locator;
pub mod snapshot;
pub mod store;
pub mod sync;
#[cfg(test)]
mod tests;

pub use adapter::{DomAdapter, EditorKind, LegacyAdapter, ShadowAdapter};
pub use assign::{strip_mask, values_match, AssignEngine, InputStrategy};
pub use config::EngineConfig;
pub use container::{active_container, Container};
pub use driver::{ClickKind, Driver, Key};
pub use element::ResolvedElement;
pub use errors::EngineError;
pub use field::{Direction, FieldSpec, ValueKind};
pub use grid::{ColumnSpec, GridSession, InputOptions};
pub use locator::Locator;
pub use snapshot::{FrameContext, Node, NodeRef, Rect, Snapshot};
pub use store::SessionStore;
pub use sync::SyncGate;

use tokio::time::Instant;

/// The main entry point: one logical control thread over one browser
/// session.
///
/// A `Session` pairs a snapshot provider ([`Driver`]) with a markup flavor
/// ([`DomAdapter`]) and orchestrates the engine around them: every
/// interaction is bracketed by the synchronization gate, hard failures are
/// recorded on the `last_error` channel, and per-grid state lives in a
/// session-scoped store that resets at container changes.
pub struct Session {
    driver: Arc<dyn Driver>,
    adapter: Arc<dyn DomAdapter>,
    config: EngineConfig,
    store: Arc<SessionStore>,
    frame: FrameContext,
    last_error: Arc<Mutex<Option<String>>>,
}

impl Session {
    pub fn new(driver: Arc<dyn Driver>, adapter: Arc<dyn DomAdapter>) -> Self {
        Self::with_config(driver, adapter, EngineConfig::default())
    }

    pub fn with_config(
        driver: Arc<dyn Driver>,
        adapter: Arc<dyn DomAdapter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            driver,
            adapter,
            config,
            store: Arc::new(SessionStore::new()),
            frame: FrameContext::Top,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Scope the session to a named sub-frame.
    pub fn in_frame(mut self, name: impl Into<String>) -> Self {
        self.frame = FrameContext::Frame(name.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Capture a snapshot, polling until the provider returns a non-empty
    /// tree or the operation timeout expires.
    #[instrument(level = "debug", skip(self))]
    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let deadline = Instant::now() + self.config.operation_timeout;
        loop {
            let snapshot = self.driver.snapshot(&self.frame).await?;
            if !snapshot.is_empty() {
                return Ok(snapshot);
            }
            if Instant::now() >= deadline {
                return Err(self.record(EngineError::Timeout(
                    "snapshot stayed empty".to_string(),
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// The active container right now, if any. Soft: no polling.
    pub async fn active_container(&self) -> Result<Option<Container>, EngineError> {
        let snapshot = self.driver.snapshot(&self.frame).await?;
        Ok(active_container(&snapshot, self.adapter.as_ref()))
    }

    /// Poll for an active container until the operation timeout. `None`
    /// means none appeared; callers that need one treat that as fatal.
    pub async fn wait_for_container(&self) -> Result<Option<Container>, EngineError> {
        let deadline = Instant::now() + self.config.operation_timeout;
        loop {
            if let Some(container) = self.active_container().await? {
                self.store.note_container(&container.id);
                return Ok(Some(container));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Wait for the application's busy signal to clear. Soft: returns
    /// `false` when still blocked at the gate timeout; the caller's own
    /// deadline decides whether that is fatal.
    pub async fn wait_until_not_blocked(&self, timeout: Option<Duration>) -> bool {
        let gate = SyncGate::new(
            self.driver.clone(),
            self.adapter.clone(),
            self.config.clone(),
            self.frame.clone(),
        );
        match gate.wait_until_not_blocked(timeout).await {
            Ok(clear) => clear,
            Err(e) => {
                error!("gate poll failed: {e}");
                self.record(e);
                false
            }
        }
    }

    fn locator(&self) -> Locator {
        Locator::new(
            self.driver.clone(),
            self.adapter.clone(),
            self.config.clone(),
            self.store.clone(),
            self.frame.clone(),
        )
    }

    /// Resolve a field spec to one widget. Hard wait: raises on exhaustion.
    #[instrument(level = "debug", skip(self))]
    pub async fn locate(&self, spec: &FieldSpec) -> Result<ResolvedElement, EngineError> {
        self.wait_until_not_blocked(None).await;
        self.locator().locate(spec).await.map_err(|e| self.record(e))
    }

    /// Soft existence probe: never raises, never records an error.
    pub async fn exists(&self, spec: &FieldSpec) -> bool {
        self.locator().exists(spec).await
    }

    /// Assign a value to an already resolved widget and verify the
    /// round-trip, bracketed by the synchronization gate.
    #[instrument(level = "debug", skip(self, element))]
    pub async fn assign(
        &self,
        element: &ResolvedElement,
        value: &str,
        kind: ValueKind,
        check_after: bool,
    ) -> Result<(), EngineError> {
        self.wait_until_not_blocked(None).await;
        let engine = AssignEngine::new(
            self.driver.clone(),
            self.adapter.clone(),
            self.config.clone(),
            self.frame.clone(),
        );
        let result = engine.assign(element, value, kind, check_after).await;
        self.wait_until_not_blocked(None).await;
        result.map_err(|e| self.record(e))
    }

    /// Locate-and-assign in one call, inferring the value kind.
    pub async fn set_value(&self, spec: &FieldSpec, value: &str) -> Result<(), EngineError> {
        let element = self.locate(spec).await?;
        self.assign(&element, value, ValueKind::infer(value), true)
            .await
    }

    /// Locate a clickable element and click it, bracketed by the gate.
    pub async fn click(&self, spec: &FieldSpec) -> Result<(), EngineError> {
        let element = self.locate(spec).await?;
        element.click().await.map_err(|e| self.record(e))?;
        self.wait_until_not_blocked(None).await;
        Ok(())
    }

    /// Begin a grid edit against the `grid_index`-th grid (0-based, in
    /// document order) of the active container. The returned session owns
    /// the pending queues; nothing touches the page until `commit()`.
    pub fn grid(&self, grid_index: usize) -> GridSession {
        GridSession::new(
            self.driver.clone(),
            self.adapter.clone(),
            self.config.clone(),
            self.store.clone(),
            self.frame.clone(),
            grid_index,
        )
    }

    /// Commit a grid session, bracketed by the gate, recording failures.
    pub async fn commit_grid(&self, grid: &mut GridSession) -> Result<(), EngineError> {
        self.wait_until_not_blocked(None).await;
        let result = grid.commit().await;
        self.wait_until_not_blocked(None).await;
        result.map_err(|e| self.record(e))
    }

    /// The most recent fatal error, for the command surface's reporting.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    pub fn clear_last_error(&self) {
        *self.last_error.lock().unwrap() = None;
    }

    /// Drop session-scoped state after the caller restarts the remote
    /// application.
    pub fn reset(&self) {
        debug!("resetting session store");
        self.store.reset();
        self.clear_last_error();
    }

    fn record(&self, error: EngineError) -> EngineError {
        if error.is_fatal() {
            *self.last_error.lock().unwrap() = Some(error.to_string());
        }
        error
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            adapter: self.adapter.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            frame: self.frame.clone(),
            last_error: self.last_error.clone(),
        }
    }
}
