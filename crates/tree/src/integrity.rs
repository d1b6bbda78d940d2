//! Integrity checking and explicit repair.
//!
//! `validate_integrity` never mutates and is never called implicitly by the
//! tree mutators. `repair` is a separate, opt-in operation for sessions
//! loaded from damaged storage.

use crate::navigator::{descend_to_leaf, update_selection_memory};
use branchloom_core::message::{MessageNode, NodeId, Role};
use branchloom_core::session::ConversationSession;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

/// One integrity violation found in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// `root_node_id` does not resolve
    MissingRoot { root_id: NodeId },
    /// `active_leaf_id` does not resolve
    MissingActiveLeaf { leaf_id: NodeId },
    /// The root claims a parent
    RootHasParent { root_id: NodeId, parent_id: NodeId },
    /// Arena key and node id disagree
    KeyMismatch { key: NodeId, node_id: NodeId },
    /// A non-root node without a parent
    DetachedNode { node_id: NodeId },
    /// `parent_id` points at a node that does not exist
    DanglingParent { node_id: NodeId, parent_id: NodeId },
    /// A child id that does not exist
    DanglingChild { parent_id: NodeId, child_id: NodeId },
    /// Listed as a child, but the child names another parent
    ParentMismatch {
        parent_id: NodeId,
        child_id: NodeId,
        actual_parent: Option<NodeId>,
    },
    /// Names a parent that does not list it
    NotListedByParent { node_id: NodeId, parent_id: NodeId },
    /// The same child listed twice
    DuplicateChild { parent_id: NodeId, child_id: NodeId },
    /// Not reachable from the root
    Unreachable { node_id: NodeId },
    /// Selection memory entry that is not a live parent/child edge
    StaleSelection { parent_id: NodeId, child_id: NodeId },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRoot { root_id } => write!(f, "root {root_id} does not exist"),
            Self::MissingActiveLeaf { leaf_id } => {
                write!(f, "active leaf {leaf_id} does not exist")
            }
            Self::RootHasParent { root_id, parent_id } => {
                write!(f, "root {root_id} has parent {parent_id}")
            }
            Self::KeyMismatch { key, node_id } => {
                write!(f, "arena key {key} holds node {node_id}")
            }
            Self::DetachedNode { node_id } => write!(f, "non-root node {node_id} has no parent"),
            Self::DanglingParent { node_id, parent_id } => {
                write!(f, "node {node_id} references missing parent {parent_id}")
            }
            Self::DanglingChild { parent_id, child_id } => {
                write!(f, "node {parent_id} lists missing child {child_id}")
            }
            Self::ParentMismatch {
                parent_id,
                child_id,
                actual_parent,
            } => write!(
                f,
                "node {parent_id} lists child {child_id}, whose parent is {}",
                actual_parent.as_deref().unwrap_or("<none>")
            ),
            Self::NotListedByParent { node_id, parent_id } => {
                write!(f, "node {node_id} is not listed by its parent {parent_id}")
            }
            Self::DuplicateChild { parent_id, child_id } => {
                write!(f, "node {parent_id} lists child {child_id} more than once")
            }
            Self::Unreachable { node_id } => write!(f, "node {node_id} is unreachable from root"),
            Self::StaleSelection {
                parent_id,
                child_id,
            } => write!(f, "selection {parent_id} -> {child_id} is not a live edge"),
        }
    }
}

fn sorted_ids(session: &ConversationSession) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = session.nodes.keys().cloned().collect();
    ids.sort();
    ids
}

/// Node ids reachable from the root through child links.
fn reachable_from_root(session: &ConversationSession) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    if !session.contains(&session.root_node_id) {
        return seen;
    }
    let mut queue = VecDeque::from([session.root_node_id.clone()]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(node) = session.get(&id) {
            for child in &node.children_ids {
                if session.contains(child) && !seen.contains(child) {
                    queue.push_back(child.clone());
                }
            }
        }
    }
    seen
}

/// Report every integrity violation. Output order is deterministic.
pub fn validate_integrity(session: &ConversationSession) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    match session.root() {
        None => issues.push(IntegrityIssue::MissingRoot {
            root_id: session.root_node_id.clone(),
        }),
        Some(root) => {
            if let Some(parent_id) = &root.parent_id {
                issues.push(IntegrityIssue::RootHasParent {
                    root_id: root.id.clone(),
                    parent_id: parent_id.clone(),
                });
            }
        }
    }
    if !session.contains(&session.active_leaf_id) {
        issues.push(IntegrityIssue::MissingActiveLeaf {
            leaf_id: session.active_leaf_id.clone(),
        });
    }

    for key in sorted_ids(session) {
        let Some(node) = session.get(&key) else {
            continue;
        };
        if node.id != key {
            issues.push(IntegrityIssue::KeyMismatch {
                key: key.clone(),
                node_id: node.id.clone(),
            });
        }

        match &node.parent_id {
            None if key != session.root_node_id => {
                issues.push(IntegrityIssue::DetachedNode {
                    node_id: key.clone(),
                });
            }
            None => {}
            Some(parent_id) => match session.get(parent_id) {
                None => issues.push(IntegrityIssue::DanglingParent {
                    node_id: key.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) if !parent.children_ids.contains(&key) => {
                    issues.push(IntegrityIssue::NotListedByParent {
                        node_id: key.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
                Some(_) => {}
            },
        }

        let mut listed: HashSet<&str> = HashSet::new();
        for child_id in &node.children_ids {
            if !listed.insert(child_id.as_str()) {
                issues.push(IntegrityIssue::DuplicateChild {
                    parent_id: key.clone(),
                    child_id: child_id.clone(),
                });
                continue;
            }
            match session.get(child_id) {
                None => issues.push(IntegrityIssue::DanglingChild {
                    parent_id: key.clone(),
                    child_id: child_id.clone(),
                }),
                Some(child) if child.parent_id.as_deref() != Some(key.as_str()) => {
                    issues.push(IntegrityIssue::ParentMismatch {
                        parent_id: key.clone(),
                        child_id: child_id.clone(),
                        actual_parent: child.parent_id.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    if session.contains(&session.root_node_id) {
        let reachable = reachable_from_root(session);
        for key in sorted_ids(session) {
            if !reachable.contains(&key) {
                issues.push(IntegrityIssue::Unreachable { node_id: key });
            }
        }
    }

    let mut selections: Vec<(&NodeId, &NodeId)> = session.selection_memory.iter().collect();
    selections.sort();
    for (parent_id, child_id) in selections {
        let live = session
            .get(parent_id)
            .is_some_and(|p| p.children_ids.contains(child_id))
            && session.contains(child_id);
        if !live {
            issues.push(IntegrityIssue::StaleSelection {
                parent_id: parent_id.clone(),
                child_id: child_id.clone(),
            });
        }
    }

    issues
}

/// What [`repair`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub root_recreated: bool,
    pub keys_fixed: usize,
    pub child_links_removed: usize,
    pub child_links_added: usize,
    pub nodes_reattached: usize,
    pub selections_pruned: usize,
    pub active_leaf_reset: bool,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Restore the structural invariants of a damaged session.
///
/// Child lists are trusted less than parent links: a child entry is kept
/// only when the child exists and names this node as its parent. Nodes whose
/// parent is gone, and cycles cut off from the root, are re-attached under
/// the root.
pub fn repair(session: &mut ConversationSession) -> RepairReport {
    let mut report = RepairReport::default();

    // Arena keys are authoritative for ids.
    for key in sorted_ids(session) {
        if let Some(node) = session.get_mut(&key) {
            if node.id != key {
                node.id = key.clone();
                report.keys_fixed += 1;
            }
        }
    }

    if !session.contains(&session.root_node_id) {
        let root = MessageNode::new(Role::System, "", None);
        warn!(old_root = %session.root_node_id, new_root = %root.id, "Root missing, recreating");
        session.root_node_id = root.id.clone();
        session.nodes.insert(root.id.clone(), root);
        report.root_recreated = true;
    }
    let root_id = session.root_node_id.clone();
    if let Some(root) = session.get_mut(&root_id) {
        root.parent_id = None;
    }

    // Drop child entries that are missing, duplicated, or disowned.
    for key in sorted_ids(session) {
        let Some(node) = session.get(&key) else {
            continue;
        };
        let mut seen: HashSet<NodeId> = HashSet::new();
        let kept: Vec<NodeId> = node
            .children_ids
            .iter()
            .filter(|c| {
                session
                    .get(c)
                    .is_some_and(|child| child.parent_id.as_deref() == Some(key.as_str()))
                    && seen.insert((*c).clone())
            })
            .cloned()
            .collect();
        let removed = node.children_ids.len() - kept.len();
        if removed > 0 {
            report.child_links_removed += removed;
            if let Some(node) = session.get_mut(&key) {
                node.children_ids = kept;
            }
        }
    }

    // Re-home nodes whose parent is missing; relink nodes their parent forgot.
    for key in sorted_ids(session) {
        if key == root_id {
            continue;
        }
        let parent_id = session.get(&key).and_then(|n| n.parent_id.clone());
        match parent_id {
            Some(pid) if session.contains(&pid) => {
                let listed = session
                    .get(&pid)
                    .is_some_and(|p| p.children_ids.contains(&key));
                if !listed {
                    if let Some(parent) = session.get_mut(&pid) {
                        parent.children_ids.push(key.clone());
                    }
                    report.child_links_added += 1;
                }
            }
            _ => {
                attach_to_root(session, &key);
                report.nodes_reattached += 1;
            }
        }
    }

    // Cycles detached from the root: cut one node loose per pass.
    loop {
        let reachable = reachable_from_root(session);
        let Some(stray) = sorted_ids(session)
            .into_iter()
            .find(|id| !reachable.contains(id))
        else {
            break;
        };
        if let Some(pid) = session.get(&stray).and_then(|n| n.parent_id.clone()) {
            if let Some(parent) = session.get_mut(&pid) {
                parent.children_ids.retain(|c| c != &stray);
            }
        }
        attach_to_root(session, &stray);
        report.nodes_reattached += 1;
    }

    let before = session.selection_memory.len();
    let live: Vec<(NodeId, NodeId)> = session
        .selection_memory
        .iter()
        .filter(|(p, c)| {
            session
                .get(p)
                .is_some_and(|parent| parent.children_ids.contains(c))
                && session.contains(c)
        })
        .map(|(p, c)| (p.clone(), c.clone()))
        .collect();
    session.selection_memory = live.into_iter().collect();
    report.selections_pruned = before - session.selection_memory.len();

    if !session.contains(&session.active_leaf_id) {
        let leaf = descend_to_leaf(session, &root_id);
        session.active_leaf_id = leaf.clone();
        update_selection_memory(session, &leaf);
        report.active_leaf_reset = true;
    }

    if !report.is_clean() {
        info!(?report, "Session repaired");
        session.touch();
    }
    report
}

fn attach_to_root(session: &mut ConversationSession, node_id: &str) {
    let root_id = session.root_node_id.clone();
    if let Some(node) = session.get_mut(node_id) {
        node.parent_id = Some(root_id.clone());
    }
    if let Some(root) = session.get_mut(&root_id) {
        if !root.children_ids.iter().any(|c| c == node_id) {
            root.children_ids.push(node_id.to_string());
        }
    }
}
