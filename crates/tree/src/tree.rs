//! Structural operations on the node arena.
//!
//! Every function takes the session explicitly. Expected failures (missing
//! node, deleting the root, grafting a node under its own descendant) are
//! reported as `false` and leave the session untouched. Descendant walks use
//! an explicit stack so deep conversations cannot overflow the call stack.

use crate::navigator::update_selection_memory;
use branchloom_core::message::{MessageNode, NodeId, NodeStatus, Role, new_node_id};
use branchloom_core::session::ConversationSession;
use chrono::Utc;
use std::collections::HashSet;
use tracing::debug;

/// Parameters for [`create_node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Explicit id; a fresh UUID is generated when `None`.
    pub id: Option<NodeId>,
    pub parent_id: Option<NodeId>,
    pub role: Role,
    pub content: String,
    pub status: NodeStatus,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl NodeConfig {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            parent_id: None,
            role,
            content: content.into(),
            status: NodeStatus::Complete,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }
}

/// Allocate a new node. Pure constructor: the session is not touched.
pub fn create_node(config: NodeConfig) -> MessageNode {
    MessageNode {
        id: config.id.unwrap_or_else(new_node_id),
        parent_id: config.parent_id,
        children_ids: Vec::new(),
        role: config.role,
        content: config.content,
        status: config.status,
        is_enabled: true,
        timestamp: Utc::now(),
        metadata: config.metadata,
    }
}

/// Register `node` in the arena and link it under its parent.
///
/// Returns `false` without mutating when the id is already taken, or when
/// the node names a parent that does not exist.
pub fn add_node(session: &mut ConversationSession, node: MessageNode) -> bool {
    if session.contains(&node.id) {
        debug!(node_id = %node.id, "add_node rejected: duplicate id");
        return false;
    }
    if let Some(parent_id) = &node.parent_id {
        match session.get_mut(parent_id) {
            Some(parent) => parent.children_ids.push(node.id.clone()),
            None => {
                debug!(node_id = %node.id, parent_id = %parent_id, "add_node rejected: missing parent");
                return false;
            }
        }
    }
    session.nodes.insert(node.id.clone(), node);
    session.touch();
    true
}

/// Ids of `node_id` and everything below it, in depth-first pre-order.
///
/// Dangling child references are skipped; a visited set keeps a corrupted
/// (cyclic) arena from looping forever.
pub fn subtree_ids(session: &ConversationSession, node_id: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    if !session.contains(node_id) {
        return out;
    }
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = vec![node_id.to_string()];
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(node) = session.get(&id) else {
            continue;
        };
        // Reverse so that the first child is visited first.
        for child in node.children_ids.iter().rev() {
            if !seen.contains(child) {
                stack.push(child.clone());
            }
        }
        out.push(id);
    }
    out
}

/// Descendants of `node_id`, excluding the node itself.
pub fn descendant_ids(session: &ConversationSession, node_id: &str) -> HashSet<NodeId> {
    let mut set: HashSet<NodeId> = subtree_ids(session, node_id).into_iter().collect();
    set.remove(node_id);
    set
}

/// Soft delete: disable `node_id` and every descendant. No structural change.
pub fn disable_subtree(session: &mut ConversationSession, node_id: &str) -> bool {
    set_subtree_enabled(session, node_id, false)
}

/// Inverse of [`disable_subtree`].
pub fn enable_subtree(session: &mut ConversationSession, node_id: &str) -> bool {
    set_subtree_enabled(session, node_id, true)
}

fn set_subtree_enabled(session: &mut ConversationSession, node_id: &str, enabled: bool) -> bool {
    let ids = subtree_ids(session, node_id);
    if ids.is_empty() {
        return false;
    }
    for id in &ids {
        if let Some(node) = session.get_mut(id) {
            node.is_enabled = enabled;
        }
    }
    debug!(node_id, count = ids.len(), enabled, "Subtree enabled flag updated");
    session.touch();
    true
}

/// Remove `node_id` and its whole subtree from the arena.
///
/// Fails for the root and for unknown ids. When the active leaf is removed,
/// a new one is chosen: the deepest leaf of the first remaining sibling,
/// else the parent, else the root.
pub fn hard_delete(session: &mut ConversationSession, node_id: &str) -> bool {
    if node_id == session.root_node_id {
        debug!(node_id, "hard_delete rejected: node is the root");
        return false;
    }
    let Some(node) = session.get(node_id) else {
        return false;
    };
    let parent_id = node.parent_id.clone();

    let doomed: HashSet<NodeId> = subtree_ids(session, node_id).into_iter().collect();

    if let Some(pid) = &parent_id {
        if let Some(parent) = session.get_mut(pid) {
            parent.children_ids.retain(|c| c != node_id);
        }
    }
    for id in &doomed {
        session.nodes.remove(id);
    }
    session
        .selection_memory
        .retain(|parent, child| !doomed.contains(parent) && !doomed.contains(child));

    if doomed.contains(&session.active_leaf_id) {
        let first_sibling = parent_id
            .as_ref()
            .and_then(|pid| session.get(pid))
            .and_then(|parent| {
                parent
                    .children_ids
                    .iter()
                    .find(|c| session.contains(c))
                    .cloned()
            });

        let new_leaf = match (first_sibling, parent_id) {
            (Some(sibling), _) => deepest_leaf(session, &sibling),
            (None, Some(pid)) if session.contains(&pid) => pid,
            _ => session.root_node_id.clone(),
        };
        debug!(node_id, new_leaf = %new_leaf, "Active leaf re-resolved after delete");
        session.active_leaf_id = new_leaf.clone();
        update_selection_memory(session, &new_leaf);
    }

    debug!(node_id, removed = doomed.len(), "Subtree hard-deleted");
    session.touch();
    true
}

/// The leaf furthest below `node_id`. Ties go to the earliest branch in
/// child order.
fn deepest_leaf(session: &ConversationSession, node_id: &str) -> NodeId {
    let mut best = (node_id.to_string(), 0usize);
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(node_id.to_string(), 0)];
    while let Some((id, depth)) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(node) = session.get(&id) else {
            continue;
        };
        if depth > best.1 {
            best = (id.clone(), depth);
        }
        for child in node.children_ids.iter().rev() {
            if session.contains(child) {
                stack.push((child.clone(), depth + 1));
            }
        }
    }
    best.0
}

/// Move `node_id` (with its subtree) under `new_parent_id`.
///
/// Fails for the root, for self-parenting, for unknown ids, and when the new
/// parent lies inside the moved subtree (which would create a cycle).
pub fn reparent(session: &mut ConversationSession, node_id: &str, new_parent_id: &str) -> bool {
    if node_id == session.root_node_id || node_id == new_parent_id {
        return false;
    }
    if !session.contains(new_parent_id) {
        return false;
    }
    let Some(node) = session.get(node_id) else {
        return false;
    };
    let old_parent_id = node.parent_id.clone();

    if descendant_ids(session, node_id).contains(new_parent_id) {
        debug!(node_id, new_parent_id, "reparent rejected: would create a cycle");
        return false;
    }

    if let Some(pid) = &old_parent_id {
        if let Some(old_parent) = session.get_mut(pid) {
            old_parent.children_ids.retain(|c| c != node_id);
        }
        if session.selection_memory.get(pid).map(String::as_str) == Some(node_id) {
            session.selection_memory.remove(pid);
        }
    }
    if let Some(new_parent) = session.get_mut(new_parent_id) {
        new_parent.children_ids.push(node_id.to_string());
    }
    if let Some(node) = session.get_mut(node_id) {
        node.parent_id = Some(new_parent_id.to_string());
    }

    let leaf = session.active_leaf_id.clone();
    update_selection_memory(session, &leaf);
    session.touch();
    true
}
