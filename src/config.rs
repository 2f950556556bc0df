//! Engine tuning knobs.
//!
//! Every polling loop in the crate derives its absolute deadline from
//! `operation_timeout`; the synchronization gate additionally runs on half
//! of it so the caller's outer deadline always governs fatality.

use std::time::Duration;

/// Configuration shared by the locator, assignment engine and grid model.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whole-operation timeout for hard waits (locate, assign, grid commit).
    pub operation_timeout: Duration,
    /// Sleep between poll iterations.
    pub poll_interval: Duration,
    /// Safe-margin width as a fraction of the container width.
    pub margin_width_ratio: f64,
    /// Safe-margin height as a fraction of the container height.
    pub margin_height_ratio: f64,
    /// Multiplier applied to both margin ratios.
    ///
    /// The default ratios are empirically tuned against real dialog layouts;
    /// widen them here rather than patching the locator when a layout places
    /// inputs further from their labels.
    pub margin_multiplier: f64,
    /// Maximum rounds through the ordered input-strategy list per attempt.
    pub max_strategy_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            margin_width_ratio: 0.015,
            margin_height_ratio: 0.01,
            margin_multiplier: 1.5,
            max_strategy_rounds: 3,
        }
    }
}

impl EngineConfig {
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_margin_ratios(mut self, width: f64, height: f64) -> Self {
        self.margin_width_ratio = width;
        self.margin_height_ratio = height;
        self
    }

    pub fn with_margin_multiplier(mut self, multiplier: f64) -> Self {
        self.margin_multiplier = multiplier;
        self
    }

    /// Effective safe margin in pixels for a container of the given size.
    pub fn safe_margin(&self, container_width: f64, container_height: f64) -> (f64, f64) {
        (
            container_width * self.margin_width_ratio * self.margin_multiplier,
            container_height * self.margin_height_ratio * self.margin_multiplier,
        )
    }

    /// The gate's local timeout, nested inside the caller's full timeout.
    pub fn gate_timeout(&self) -> Duration {
        self.operation_timeout / 2
    }
}
