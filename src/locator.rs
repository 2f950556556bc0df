//! Element resolution: from a fuzzy field specification to one widget.
//!
//! The target UI gives no stable semantic link between a label and its
//! input (no `for`/`id` pairing), and dialog layouts place the input above,
//! beside or below the label inconsistently. Proximity is the only reliable
//! signal, so resolution is: match the label text, then search the
//! container spatially for the nearest input-capable widget in the allowed
//! direction, within a safe margin proportional to the container size.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::adapter::DomAdapter;
use crate::config::EngineConfig;
use crate::container::{active_container, Container};
use crate::driver::Driver;
use crate::element::ResolvedElement;
use crate::errors::EngineError;
use crate::field::{Direction, FieldSpec};
use crate::snapshot::{FrameContext, Node, NodeRef, Rect, Snapshot};
use crate::store::SessionStore;

/// Scores within this many pixels of each other count as tied.
const DISTANCE_EPSILON: f64 = 0.5;

pub struct Locator {
    driver: Arc<dyn Driver>,
    adapter: Arc<dyn DomAdapter>,
    config: EngineConfig,
    store: Arc<SessionStore>,
    frame: FrameContext,
}

impl Locator {
    pub fn new(
        driver: Arc<dyn Driver>,
        adapter: Arc<dyn DomAdapter>,
        config: EngineConfig,
        store: Arc<SessionStore>,
        frame: FrameContext,
    ) -> Self {
        Self {
            driver,
            adapter,
            config,
            store,
            frame,
        }
    }

    /// Resolve a field spec to one concrete widget, polling until the
    /// operation deadline. Hard wait: exhaustion raises.
    #[instrument(level = "debug", skip(self))]
    pub async fn locate(&self, spec: &FieldSpec) -> Result<ResolvedElement, EngineError> {
        self.locate_with_timeout(spec, self.config.operation_timeout)
            .await
    }

    pub async fn locate_with_timeout(
        &self,
        spec: &FieldSpec,
        timeout: Duration,
    ) -> Result<ResolvedElement, EngineError> {
        if spec.text.trim().is_empty() {
            return Err(EngineError::InvalidSpec("empty field text".into()));
        }
        if spec.position == 0 {
            return Err(EngineError::InvalidSpec("position is 1-based".into()));
        }
        let deadline = Instant::now() + timeout;
        let mut last_error: Option<EngineError> = None;

        loop {
            match self.try_locate(spec).await {
                Ok(resolved) => return Ok(resolved),
                Err(error) => last_error = Some(error),
            }
            if Instant::now() >= deadline {
                return Err(last_error.unwrap_or_else(|| {
                    EngineError::ElementNotFound(format!("'{}' never appeared", spec.text))
                }));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Soft probe: does the spec currently resolve? Never raises.
    pub async fn exists(&self, spec: &FieldSpec) -> bool {
        self.try_locate(spec).await.is_ok()
    }

    /// One resolution attempt against a fresh snapshot.
    async fn try_locate(&self, spec: &FieldSpec) -> Result<ResolvedElement, EngineError> {
        let snapshot = self.driver.snapshot(&self.frame).await?;
        let container = active_container(&snapshot, self.adapter.as_ref()).ok_or_else(|| {
            EngineError::ElementNotFound(format!("no active container while locating '{}'", spec.text))
        })?;
        self.store.note_container(&container.id);

        let container_node = snapshot
            .node_at(&container.path)
            .ok_or_else(|| EngineError::Internal("container path vanished".into()))?;

        if spec.by_internal_name {
            return self.locate_by_internal_name(spec, &snapshot, &container, container_node);
        }
        self.locate_by_label(spec, &snapshot, &container, container_node)
            .await
    }

    /// Fast path: the application-internal field name is unambiguous, so no
    /// spatial heuristics apply; duplicates are picked by position only.
    fn locate_by_internal_name(
        &self,
        spec: &FieldSpec,
        snapshot: &Snapshot,
        container: &Container,
        container_node: &Node,
    ) -> Result<ResolvedElement, EngineError> {
        let wanted = spec.text.trim();
        let mut matches = Vec::new();
        for (node, rel_path) in container_node.walk() {
            let Some(name) = self.adapter.internal_name(node) else {
                continue;
            };
            if !name.eq_ignore_ascii_case(wanted) {
                continue;
            }
            if spec.input_widget && !self.adapter.is_input_capable(node) {
                continue;
            }
            matches.push((node, rel_path));
        }

        let total = matches.len();
        let (node, rel_path) = matches.into_iter().nth(spec.position - 1).ok_or_else(|| {
            EngineError::ElementNotFound(format!(
                "internal name '{}' occurrence {} not found ({} present)",
                wanted, spec.position, total
            ))
        })?;
        Ok(self.build_resolved(snapshot, container, node, rel_path, None))
    }

    async fn locate_by_label(
        &self,
        spec: &FieldSpec,
        snapshot: &Snapshot,
        container: &Container,
        container_node: &Node,
    ) -> Result<ResolvedElement, EngineError> {
        let target = normalize_label(&spec.text);
        let mut labels: Vec<(&Node, Vec<usize>, String)> = Vec::new();
        for (node, rel_path) in container_node.walk() {
            let Some(raw) = self.adapter.label_text(node) else {
                continue;
            };
            let normalized = normalize_label(&raw);
            if normalized == target || normalized.starts_with(&target) {
                labels.push((node, rel_path, raw));
            }
        }

        // Prefix matches are a fallback; an exact match always wins.
        if labels.len() > 1 {
            let exact: Vec<_> = labels
                .iter()
                .filter(|(_, _, raw)| normalize_label(raw) == target)
                .cloned()
                .collect();
            if !exact.is_empty() {
                labels = exact;
            }
        }

        let ambiguous_labels = labels.len() > 1;
        let label_count = labels.len();
        let Some((label_node, label_path, label_raw)) =
            labels.into_iter().nth(spec.position - 1)
        else {
            return Err(EngineError::ElementNotFound(format!(
                "label '{}' occurrence {} not found ({} present)",
                spec.text, spec.position, label_count
            )));
        };

        if !spec.input_widget {
            // The matched node is the interactive element itself.
            return Ok(self.build_resolved(snapshot, container, label_node, label_path, Some(label_raw)));
        }

        self.spatial_search(
            spec,
            snapshot,
            container,
            container_node,
            label_node,
            &label_path,
            &label_raw,
            ambiguous_labels,
            &target,
        )
        .await
    }

    /// Find the input widget belonging to a label by proximity.
    #[allow(clippy::too_many_arguments)]
    async fn spatial_search(
        &self,
        spec: &FieldSpec,
        snapshot: &Snapshot,
        container: &Container,
        container_node: &Node,
        label_node: &Node,
        label_path: &[usize],
        label_raw: &str,
        ambiguous_labels: bool,
        label_key: &str,
    ) -> Result<ResolvedElement, EngineError> {
        let label_rect = self
            .rect_of(snapshot, container, label_node, label_path)
            .await?;
        let container_rect = match container.rect {
            Some(rect) => rect,
            None => self.driver.bounding_box(&container.node_ref).await?,
        };
        let (margin_w, margin_h) = self
            .config
            .safe_margin(container_rect.width, container_rect.height);

        // Collect every input-capable widget in the container, in document
        // order, with its geometry. Widgets without readable geometry
        // cannot participate in a proximity decision.
        let mut candidates: Vec<(&Node, Vec<usize>, Rect)> = Vec::new();
        for (node, rel_path) in container_node.walk() {
            if rel_path == label_path || !self.adapter.is_input_capable(node) {
                continue;
            }
            if let Ok(rect) = self.rect_of(snapshot, container, node, &rel_path).await {
                candidates.push((node, rel_path, rect));
            }
        }

        let consumed = self.store.consumed_paths(label_key);
        let abs_path = |rel: &[usize]| -> Vec<usize> {
            container.path.iter().chain(rel.iter()).copied().collect()
        };
        let unconsumed: Vec<_> = candidates
            .iter()
            .filter(|(_, rel, _)| !consumed.contains(&abs_path(rel)))
            .cloned()
            .collect();
        if ambiguous_labels && !unconsumed.is_empty() {
            candidates = unconsumed;
        }

        let mut best: Option<(f64, &Node, Vec<usize>, Rect)> = None;
        let mut tied_identical = false;
        for (node, rel_path, rect) in candidates {
            let Some(score) = directional_score(spec.direction, &label_rect, &rect, margin_w, margin_h)
            else {
                continue;
            };
            match &best {
                Some((best_score, _, _, best_rect)) => {
                    if score < best_score - DISTANCE_EPSILON {
                        best = Some((score, node, rel_path, rect));
                        tied_identical = false;
                    } else if (score - best_score).abs() <= DISTANCE_EPSILON && rect == *best_rect {
                        // Identical geometry: neither distance nor document
                        // order can disambiguate a duplicate-render artifact.
                        tied_identical = true;
                    }
                    // Equal score at different geometry: document order
                    // already picked the first one.
                }
                None => best = Some((score, node, rel_path, rect)),
            }
        }

        if tied_identical {
            return Err(EngineError::AmbiguousResolution(format!(
                "label '{}': multiple candidates at identical coordinates",
                spec.text
            )));
        }

        let (score, node, rel_path, _rect) = best.ok_or_else(|| {
            EngineError::ElementNotFound(format!(
                "no input widget {} of label '{}' within margin ({:.1}, {:.1})",
                direction_word(spec.direction),
                spec.text,
                margin_w,
                margin_h
            ))
        })?;

        debug!(
            label = label_raw,
            direction = ?spec.direction,
            score,
            "label resolved to widget"
        );

        if ambiguous_labels {
            self.store.consume_label(label_key, abs_path(&rel_path));
        }
        Ok(self.build_resolved(snapshot, container, node, rel_path, Some(label_raw.to_string())))
    }

    /// Geometry of a node: the value captured in the snapshot when present,
    /// otherwise a live query through the driver.
    async fn rect_of(
        &self,
        snapshot: &Snapshot,
        container: &Container,
        node: &Node,
        rel_path: &[usize],
    ) -> Result<Rect, EngineError> {
        if let Some(rect) = node.rect() {
            return Ok(rect);
        }
        let mut path = container.path.clone();
        path.extend_from_slice(rel_path);
        self.driver
            .bounding_box(&NodeRef::new(snapshot.frame.clone(), path))
            .await
    }

    fn build_resolved(
        &self,
        snapshot: &Snapshot,
        container: &Container,
        node: &Node,
        rel_path: Vec<usize>,
        label: Option<String>,
    ) -> ResolvedElement {
        let mut path = container.path.clone();
        path.extend(rel_path);
        ResolvedElement::new(
            self.driver.clone(),
            NodeRef::new(snapshot.frame.clone(), path),
            container.id.clone(),
            node.tag.clone(),
            label,
            self.adapter.internal_name(node).map(|s| s.to_string()),
            node.rect(),
        )
    }
}

/// Score a candidate against the label for the requested direction.
/// `None` means the candidate is filtered out; otherwise lower is better.
fn directional_score(
    direction: Direction,
    label: &Rect,
    candidate: &Rect,
    margin_w: f64,
    margin_h: f64,
) -> Option<f64> {
    let (label_cx, label_cy) = label.center();
    let (cand_cx, cand_cy) = candidate.center();
    match direction {
        Direction::None => {
            // Reading-order heuristic: not above-left of the label beyond
            // the safe margin. Distance runs from the label center to the
            // candidate's nearest edge, so a wide input scores by the gap
            // to its near side, not by how far its center sits.
            if candidate.x >= label.x - margin_w && candidate.y >= label.y - margin_h {
                Some(candidate.distance_to_point(label_cx, label_cy))
            } else {
                None
            }
        }
        Direction::Right => {
            let aligned = (cand_cy - label_cy).abs() <= label.height / 2.0 + margin_h;
            if candidate.x >= label.right() && aligned {
                Some((cand_cx - label_cx).abs())
            } else {
                None
            }
        }
        Direction::Down => {
            let aligned = (cand_cx - label_cx).abs() <= label.width / 2.0 + margin_w;
            if candidate.y >= label.bottom() && aligned {
                Some((cand_cy - label_cy).abs())
            } else {
                None
            }
        }
        Direction::Left => {
            let aligned = (cand_cy - label_cy).abs() <= label.height / 2.0 + margin_h;
            if candidate.right() <= label.x && aligned {
                Some((label_cx - cand_cx).abs())
            } else {
                None
            }
        }
    }
}

fn direction_word(direction: Direction) -> &'static str {
    match direction {
        Direction::None => "near",
        Direction::Right => "right",
        Direction::Down => "below",
        Direction::Left => "left",
    }
}

/// Normalize a label for comparison: lowercase, collapsed whitespace,
/// trailing qualifier characters (`:`, `?`, `.`) stripped.
pub fn normalize_label(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches([':', '?', '.'])
        .trim()
        .to_lowercase()
}
