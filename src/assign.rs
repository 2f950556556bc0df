//! Value assignment: drive a value into a widget and prove it round-trips.
//!
//! The target UI attaches validation and formatting to key-level events, so
//! values are typed, never set programmatically (the script strategy exists
//! as a last resort and still dispatches a change event). Each attempt runs
//! focus → select-all → clear → type → read-back → compare; displayed and
//! target values are both normalized for input masks before comparing.

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::adapter::DomAdapter;
use crate::config::EngineConfig;
use crate::driver::{ClickKind, Driver, Key};
use crate::element::ResolvedElement;
use crate::errors::EngineError;
use crate::field::{parse_flexible_number, ValueKind};
use crate::snapshot::{FrameContext, NodeRef};

/// Characters an input mask may inject into a displayed value.
const MASK_CHARS: [char; 4] = ['.', '/', '+', '-'];

/// One way of delivering keystrokes. Strategies are tried in order, each
/// judged by the same read-back predicate, until one sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStrategy {
    /// Whole value in one simulated-typing burst.
    Burst,
    /// One key event per character, for widgets that drop bursts while
    /// reformatting.
    PerCharacter,
    /// Script-assisted set plus a synthetic change event. Last resort.
    Script,
}

impl InputStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            InputStrategy::Burst => "burst",
            InputStrategy::PerCharacter => "per-character",
            InputStrategy::Script => "script",
        }
    }
}

/// The ordered strategy list shared by field and grid-cell input.
pub const INPUT_STRATEGIES: [InputStrategy; 3] = [
    InputStrategy::Burst,
    InputStrategy::PerCharacter,
    InputStrategy::Script,
];

pub struct AssignEngine {
    driver: Arc<dyn Driver>,
    adapter: Arc<dyn DomAdapter>,
    config: EngineConfig,
    frame: FrameContext,
}

impl AssignEngine {
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

    /// Assign a value and verify it round-trips. With `check_after` false
    /// the value is applied once and trusted (append-only numeric fields
    /// that do not round-trip immediately).
    #[instrument(level = "debug", skip(self, element))]
    pub async fn assign(
        &self,
        element: &ResolvedElement,
        value: &str,
        kind: ValueKind,
        check_after: bool,
    ) -> Result<(), EngineError> {
        match kind {
            ValueKind::Boolean => self.assign_toggle(element, value).await,
            ValueKind::Choice => self.assign_choice(element, value, check_after).await,
            _ => self.assign_text(element, value, kind, check_after).await,
        }
    }

    /// Text-entry path with the bounded verify loop.
    async fn assign_text(
        &self,
        element: &ResolvedElement,
        value: &str,
        kind: ValueKind,
        check_after: bool,
    ) -> Result<(), EngineError> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let mut last_read = String::new();

        loop {
            // Read-back first: if the widget already shows the target the
            // attempt is a no-op, which keeps verified assignment
            // idempotent. Unchecked assignment always delivers its
            // keystrokes; append-only fields react to the key events, not
            // the displayed text.
            if check_after {
                last_read = element.read_value().await?;
                if values_match(value, &last_read, kind) {
                    return Ok(());
                }
            }

            for strategy in INPUT_STRATEGIES {
                self.apply_strategy(element.node_ref(), value, strategy)
                    .await?;
                if !check_after {
                    return Ok(());
                }
                last_read = element.read_value().await?;
                if values_match(value, &last_read, kind) {
                    return Ok(());
                }
                debug!(
                    strategy = strategy.name(),
                    displayed = %last_read,
                    target = %value,
                    "read-back mismatch, trying next strategy"
                );
                if Instant::now() >= deadline {
                    break;
                }
            }

            if Instant::now() >= deadline {
                return Err(EngineError::ValueMismatch {
                    expected: value.to_string(),
                    actual: last_read,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn apply_strategy(
        &self,
        target: &NodeRef,
        value: &str,
        strategy: InputStrategy,
    ) -> Result<(), EngineError> {
        // Focus and clear what is there.
        self.driver.click(target, ClickKind::Single).await?;
        self.driver.send_key(target, Key::SelectAll).await?;
        self.driver.send_key(target, Key::Delete).await?;

        if value.is_empty() {
            // A single space forces the change event an empty field would
            // otherwise never fire.
            self.driver.type_keys(target, " ").await?;
            return Ok(());
        }

        match strategy {
            InputStrategy::Burst => self.driver.type_keys(target, value).await,
            InputStrategy::PerCharacter => {
                for ch in value.chars() {
                    self.driver.type_keys(target, &ch.to_string()).await?;
                }
                Ok(())
            }
            InputStrategy::Script => {
                self.driver
                    .run_script(
                        "arguments[0].value = arguments[1]; \
                         arguments[0].dispatchEvent(new Event('change', {bubbles: true}));",
                        &[
                            serde_json::to_value(target)
                                .map_err(|e| EngineError::Internal(e.to_string()))?,
                            serde_json::Value::String(value.to_string()),
                        ],
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// Boolean targets map to a toggle widget: click and poll the checked
    /// state until it reaches the target.
    async fn assign_toggle(
        &self,
        element: &ResolvedElement,
        value: &str,
    ) -> Result<(), EngineError> {
        let target_state = matches!(
            value.trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        );
        let deadline = Instant::now() + self.config.operation_timeout;

        loop {
            let snapshot = self.driver.snapshot(&self.frame).await?;
            let toggled = snapshot
                .node_at(&element.node_ref().path)
                .map(|node| self.adapter.is_toggled(node))
                .unwrap_or(false);
            if toggled == target_state {
                return Ok(());
            }
            element.click().await?;

            if Instant::now() >= deadline {
                return Err(EngineError::ValueMismatch {
                    expected: target_state.to_string(),
                    actual: toggled.to_string(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Choice targets select the option whose text starts with the target,
    /// through the native selection mechanism rather than typing.
    async fn assign_choice(
        &self,
        element: &ResolvedElement,
        value: &str,
        check_after: bool,
    ) -> Result<(), EngineError> {
        let wanted = value.trim().to_lowercase();
        let deadline = Instant::now() + self.config.operation_timeout;
        let mut last_read = String::new();

        loop {
            let snapshot = self.driver.snapshot(&self.frame).await?;
            if let Some(widget) = snapshot.node_at(&element.node_ref().path) {
                let option = self
                    .adapter
                    .option_nodes(widget)
                    .into_iter()
                    .find(|(node, _)| node.deep_text().trim().to_lowercase().starts_with(&wanted));
                if let Some((_, rel_path)) = option {
                    element.click().await?;
                    let mut path = element.node_ref().path.clone();
                    path.extend(rel_path);
                    self.driver
                        .click(
                            &NodeRef::new(element.node_ref().frame.clone(), path),
                            ClickKind::Single,
                        )
                        .await?;
                    if !check_after {
                        return Ok(());
                    }
                    last_read = element.read_value().await?;
                    if last_read.trim().to_lowercase().starts_with(&wanted) {
                        return Ok(());
                    }
                } else {
                    warn!(target = %value, "no option with matching prefix yet");
                }
            }

            if Instant::now() >= deadline {
                return Err(EngineError::ValueMismatch {
                    expected: value.to_string(),
                    actual: last_read,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Strip input-mask characters from a value.
///
/// Numeric values keep their decimal separator: when a decimal comma is
/// present the dots are grouping and get dropped, otherwise a dot is the
/// decimal point and stays, as does the sign. Everything else drops the
/// full mask set.
pub fn strip_mask(value: &str, kind: ValueKind) -> String {
    if kind == ValueKind::Numeric {
        if value.contains(',') {
            return value.chars().filter(|c| *c != '.').collect();
        }
        return value.to_string();
    }
    value.chars().filter(|c| !MASK_CHARS.contains(c)).collect()
}

/// Compare a target value against a displayed value under mask removal and
/// normalization. Numerics compare as floats so `"1.0"` equals `"1,00"`.
pub fn values_match(expected: &str, actual: &str, kind: ValueKind) -> bool {
    let expected_stripped = strip_mask(expected, kind);
    let actual_stripped = strip_mask(actual, kind);

    if kind == ValueKind::Numeric {
        if let (Some(a), Some(b)) = (
            parse_flexible_number(&expected_stripped),
            parse_flexible_number(&actual_stripped),
        ) {
            return (a - b).abs() < 1e-9;
        }
    }

    normalize_for_compare(&expected_stripped) == normalize_for_compare(&actual_stripped)
}

/// Case-insensitive, whitespace-free, comma/period-unified form.
fn normalize_for_compare(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Truncate to a field's declared length. Every character counts against
/// the budget, masks included, matching the widget's own maxlength.
pub fn truncate_to_length(value: &str, declared: Option<usize>) -> String {
    match declared {
        Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
        _ => value.to_string(),
    }
}
