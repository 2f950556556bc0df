//! Synchronization gate: wait for the application's busy signal to clear.
//!
//! The gate runs on half of the caller's operation timeout. If the blocking
//! overlay outlives that, the gate logs which container is blocking and
//! returns `false` instead of raising: legitimate long server operations
//! keep the overlay up for a while, and only the caller's own deadline
//! decides when that becomes fatal.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::adapter::DomAdapter;
use crate::config::EngineConfig;
use crate::container::active_container;
use crate::driver::Driver;
use crate::errors::EngineError;
use crate::snapshot::FrameContext;

pub struct SyncGate {
    driver: Arc<dyn Driver>,
    adapter: Arc<dyn DomAdapter>,
    config: EngineConfig,
    frame: FrameContext,
}

impl SyncGate {
    pub fn new(
        driver: Arc<dyn Driver>,
        adapter: Arc<dyn DomAdapter>,
        config: EngineConfig,
        frame: FrameContext,
    ) -> Self {
        Self {
            driver,
            adapter,
            config,
            frame,
        }
    }

    /// Poll until no blocking signal is observed or the gate's local
    /// timeout elapses. Returns `true` when the UI is free to interact
    /// with, `false` when still blocked at expiry. At least one poll always
    /// happens, so a cleared overlay is always confirmed by observation.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait_until_not_blocked(&self, timeout: Option<Duration>) -> Result<bool, EngineError> {
        let half_timeout = timeout.unwrap_or_else(|| self.config.gate_timeout());
        let deadline = Instant::now() + half_timeout;
        let mut last_blocker: Option<(String, String)> = None;

        loop {
            let snapshot = self.driver.snapshot(&self.frame).await?;
            match active_container(&snapshot, self.adapter.as_ref()) {
                Some(container) => {
                    let node = snapshot
                        .node_at(&container.path)
                        .ok_or_else(|| EngineError::Internal("container path vanished".into()))?;
                    if !self.adapter.is_blocked(node) {
                        debug!(container = %container.id, "not blocked");
                        return Ok(true);
                    }
                    last_blocker = Some((container.id.clone(), container.title.clone()));
                }
                // No container at all: nothing can be blocked. The caller's
                // own resolution loop deals with the missing container.
                None => return Ok(true),
            }

            if Instant::now() >= deadline {
                let (id, title) = last_blocker.unwrap_or_default();
                warn!(
                    container_id = %id,
                    container_title = %title,
                    timeout = ?half_timeout,
                    "still blocked at gate timeout, deferring to caller's deadline"
                );
                return Ok(false);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
