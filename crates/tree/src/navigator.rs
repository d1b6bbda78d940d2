//! Branch navigation: per-branch-point selection memory and active path
//! resolution.
//!
//! Each branching node remembers which child the user last viewed. Without
//! that, switching away from a branch and back would always land on the
//! newest sibling and lose the user's place in the alternate branch.

use branchloom_core::message::{MessageNode, NodeId};
use branchloom_core::session::ConversationSession;
use std::collections::HashSet;
use tracing::warn;

/// Record every (parent → child) edge on the path from `leaf_id` up to the
/// root. Idempotent.
pub fn update_selection_memory(session: &mut ConversationSession, leaf_id: &str) {
    let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = session.get(leaf_id);
    while let Some(node) = current {
        if !seen.insert(node.id.as_str()) {
            warn!(node_id = %node.id, "Cycle detected while walking to root");
            break;
        }
        let Some(parent_id) = &node.parent_id else {
            break;
        };
        match session.get(parent_id) {
            Some(parent) => {
                edges.push((parent.id.clone(), node.id.clone()));
                current = Some(parent);
            }
            None => {
                warn!(node_id = %node.id, parent_id = %parent_id, "Dangling parent reference");
                break;
            }
        }
    }
    for (parent, child) in edges {
        session.selection_memory.insert(parent, child);
    }
}

/// The child a walk should follow from `node`: the remembered selection if
/// it is still one of the node's children, otherwise the newest child.
pub fn preferred_child<'a>(
    session: &'a ConversationSession,
    node: &'a MessageNode,
) -> Option<&'a NodeId> {
    if let Some(remembered) = session.selection_memory.get(&node.id) {
        if node.children_ids.contains(remembered) && session.contains(remembered) {
            return Some(remembered);
        }
    }
    node.children_ids.last()
}

/// Walk down from `start` following preferred children and collect every
/// node visited, `start` included. Stops at a leaf, at a dangling child
/// reference (logged) or at a revisited node.
fn walk_down<'a>(session: &'a ConversationSession, start: &'a MessageNode) -> Vec<&'a MessageNode> {
    let mut path = vec![start];
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(start.id.as_str());
    let mut current = start;
    while let Some(child_id) = preferred_child(session, current) {
        let Some(child) = session.get(child_id) else {
            warn!(parent_id = %current.id, child_id = %child_id, "Dangling child reference, path truncated");
            break;
        };
        if !seen.insert(child.id.as_str()) {
            warn!(node_id = %child.id, "Cycle detected, path truncated");
            break;
        }
        path.push(child);
        current = child;
    }
    path
}

/// The root-to-leaf path of *enabled* nodes the session currently shows.
///
/// Disabled nodes are walked through but left out of the result.
pub fn resolve_active_path(session: &ConversationSession) -> Vec<&MessageNode> {
    let Some(root) = session.root() else {
        warn!(root_id = %session.root_node_id, "Session root missing");
        return Vec::new();
    };
    walk_down(session, root)
        .into_iter()
        .filter(|n| n.is_enabled)
        .collect()
}

/// Leaf reached by following preferred children from `node_id`.
/// Returns `node_id` itself when it is a leaf (or unknown).
pub fn descend_to_leaf(session: &ConversationSession, node_id: &str) -> NodeId {
    match session.get(node_id) {
        Some(start) => walk_down(session, start)
            .last()
            .map(|n| n.id.clone())
            .unwrap_or_else(|| node_id.to_string()),
        None => node_id.to_string(),
    }
}

/// Nodes from the root down to `node_id` (inclusive), following parent
/// links. A dangling parent truncates the path at the last valid node.
/// Disabled nodes are included; callers filter.
pub fn path_to<'a>(session: &'a ConversationSession, node_id: &str) -> Vec<&'a MessageNode> {
    let mut path = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = session.get(node_id);
    while let Some(node) = current {
        if !seen.insert(node.id.as_str()) {
            warn!(node_id = %node.id, "Cycle detected while walking to root");
            break;
        }
        path.push(node);
        current = match &node.parent_id {
            Some(parent_id) => {
                let parent = session.get(parent_id);
                if parent.is_none() {
                    warn!(node_id = %node.id, parent_id = %parent_id, "Dangling parent reference, path truncated");
                }
                parent
            }
            None => None,
        };
    }
    path.reverse();
    path
}

/// Make `leaf_id` the active leaf and remember the path to it.
pub fn update_active_leaf(session: &mut ConversationSession, leaf_id: &str) -> bool {
    if !session.contains(leaf_id) {
        return false;
    }
    session.active_leaf_id = leaf_id.to_string();
    update_selection_memory(session, leaf_id);
    session.touch();
    true
}

/// Switch to the branch through `node_id`: remember the path to it, then
/// continue down to that branch's remembered leaf and make it active.
pub fn select_branch(session: &mut ConversationSession, node_id: &str) -> Option<NodeId> {
    if !session.contains(node_id) {
        return None;
    }
    update_selection_memory(session, node_id);
    let leaf = descend_to_leaf(session, node_id);
    update_active_leaf(session, &leaf);
    Some(leaf)
}

/// Zero-based position of `node_id` among its siblings, and the sibling
/// count. The root reports `(0, 1)`.
pub fn sibling_position(session: &ConversationSession, node_id: &str) -> Option<(usize, usize)> {
    let node = session.get(node_id)?;
    let Some(parent_id) = &node.parent_id else {
        return Some((0, 1));
    };
    let parent = session.get(parent_id)?;
    let index = parent.children_ids.iter().position(|c| c == node_id)?;
    Some((index, parent.children_ids.len()))
}
