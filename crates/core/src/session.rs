//! The conversation session: a flat arena of nodes plus navigation state.
//!
//! Nodes reference each other by id, so reparenting, cycle checks and
//! serialization never fight the borrow checker. Every operation in the
//! workspace takes the session explicitly; there is no ambient state.

use crate::message::{MessageNode, NodeId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One conversation instance holding the full node tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: SessionId,

    pub root_node_id: NodeId,

    /// The node representing the currently displayed end of the conversation
    pub active_leaf_id: NodeId,

    pub nodes: HashMap<NodeId, MessageNode>,

    /// Branch point → preferred child, remembered across branch switches
    #[serde(default)]
    pub selection_memory: HashMap<NodeId, NodeId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Optional title (auto-generated or user-set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ConversationSession {
    /// Create a session containing only an empty system root.
    pub fn new() -> Self {
        let root = MessageNode::new(Role::System, "", None);
        let root_id = root.id.clone();
        let now = Utc::now();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            id: SessionId::new(),
            root_node_id: root_id.clone(),
            active_leaf_id: root_id,
            nodes,
            selection_memory: HashMap::new(),
            created_at: now,
            updated_at: now,
            title: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<&MessageNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut MessageNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn root(&self) -> Option<&MessageNode> {
        self.nodes.get(&self.root_node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mark the session as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight listing entry returned by session stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub node_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&ConversationSession> for SessionSummary {
    fn from(session: &ConversationSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            node_count: session.nodes.len(),
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_system_root_as_active_leaf() {
        let session = ConversationSession::new();
        assert_eq!(session.len(), 1);
        assert_eq!(session.root_node_id, session.active_leaf_id);

        let root = session.root().unwrap();
        assert_eq!(root.role, Role::System);
        assert!(root.is_root());
    }

    #[test]
    fn touch_advances_updated_at() {
        let mut session = ConversationSession::new();
        let before = session.updated_at;
        session.touch();
        assert!(session.updated_at >= before);
    }

    #[test]
    fn session_serialization_roundtrip() {
        let session = ConversationSession::new();
        let json = serde_json::to_string(&session).unwrap();
        let restored: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn summary_counts_nodes() {
        let session = ConversationSession::new();
        let summary = SessionSummary::from(&session);
        assert_eq!(summary.node_count, 1);
        assert_eq!(summary.id, session.id);
    }
}
