//! Active-container resolution.
//!
//! Multiple overlapping dialogs can exist in one snapshot; interactions must
//! target the topmost one. The resolver is pure over a snapshot and is
//! recomputed on every locate/wait operation. Containers are never cached
//! across polls: the tree is the single source of truth.

use tracing::debug;

use crate::adapter::DomAdapter;
use crate::snapshot::{NodeRef, Rect, Snapshot};

/// The currently active dialog/panel/page region of one snapshot.
#[derive(Debug, Clone)]
pub struct Container {
    /// Resolve-on-demand identity of the container node.
    pub node_ref: NodeRef,
    /// Structural path within the snapshot it was selected from.
    pub path: Vec<usize>,
    pub id: String,
    pub title: String,
    /// Layering rank; higher means closer to the user.
    pub rank: i64,
    pub rect: Option<Rect>,
}

/// Select the active container: candidates matching the adapter's selector
/// set, artifact layers dropped, ranked by layering order, duplicates at
/// identical coordinates collapsed onto the higher-ranked one.
pub fn active_container(snapshot: &Snapshot, adapter: &dyn DomAdapter) -> Option<Container> {
    let mut candidates: Vec<Container> = Vec::new();

    for (node, path) in snapshot.root.walk() {
        if !adapter.is_container(node) || adapter.is_artifact_layer(node) {
            continue;
        }
        if !node.is_visible() {
            continue;
        }
        let id = node
            .attr("id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("container@{}", join_path(&path)));
        candidates.push(Container {
            node_ref: NodeRef::new(snapshot.frame.clone(), path.clone()),
            path,
            id,
            title: adapter.container_title(node),
            rank: node.z_index(),
            rect: node.rect(),
        });
    }

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| b.rank.cmp(&a.rank).then(a.path.cmp(&b.path)));

    // A known rendering artifact duplicates a dialog at the exact same
    // coordinates; keep the higher-ranked copy only.
    let mut kept: Vec<Container> = Vec::new();
    for candidate in candidates {
        let duplicate = kept.iter().any(|k| match (&k.rect, &candidate.rect) {
            (Some(a), Some(b)) => a.x == b.x && a.y == b.y,
            _ => false,
        });
        if duplicate {
            debug!(
                id = %candidate.id,
                "discarding duplicate container at identical coordinates"
            );
            continue;
        }
        kept.push(candidate);
    }

    let top = kept.into_iter().next();
    if let Some(ref c) = top {
        debug!(id = %c.id, title = %c.title, rank = c.rank, "active container");
    }
    top
}

fn join_path(path: &[usize]) -> String {
    path.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
