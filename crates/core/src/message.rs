//! Message node and assembled-message domain types.
//!
//! A `MessageNode` lives inside a session's node arena and refers to its
//! parent and children by id. An `AssembledMessage` is what the context
//! pipeline produces: role + content plus provenance for diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a node inside a session's arena.
pub type NodeId = String;

/// Generate a fresh node id.
pub fn new_node_id() -> NodeId {
    Uuid::new_v4().to_string()
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (template text, profile, summaries)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
}

impl Role {
    /// Whether this role belongs to the user/assistant conversation stream.
    pub fn is_conversational(self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// Generation status of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Complete,
    Generating,
    Error,
}

/// A single message in the conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    /// Unique node ID
    pub id: NodeId,

    /// Parent node. `None` only for the session root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,

    /// Children in creation order. The last entry is the newest branch.
    #[serde(default)]
    pub children_ids: Vec<NodeId>,

    /// Who authored this message
    pub role: Role,

    /// The text content
    pub content: String,

    #[serde(default)]
    pub status: NodeStatus,

    /// Soft-delete flag. Disabled nodes stay in the tree but are skipped
    /// when resolving the active path.
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,

    pub timestamp: DateTime<Utc>,

    /// Opaque caller metadata (model name, token usage, attachments, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl MessageNode {
    /// Create a detached node with a fresh id.
    pub fn new(role: Role, content: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id: new_node_id(),
            parent_id,
            children_ids: Vec::new(),
            role,
            content: content.into(),
            status: NodeStatus::Complete,
            is_enabled: true,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Where an assembled message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Skeleton preset placed inline in template order
    Preset,
    /// The resolved user profile block
    UserProfile,
    /// A tree node from the session history
    History,
    /// Preset placed relative to an anchor
    AnchorInjection,
    /// Preset placed by counting back from the end
    DepthInjection,
    /// Synthetic summary produced by history compression
    Summary,
}

/// Diagnostic provenance of an assembled message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: SourceType,
    /// Preset id, node id, or a synthetic id for summaries
    pub source_id: String,
    /// Template index for presets, history index for nodes
    pub source_index: usize,
}

/// One message of an assembled context, carrying its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledMessage {
    pub role: Role,
    pub content: String,
    pub provenance: Provenance,
}

impl AssembledMessage {
    pub fn new(role: Role, content: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            role,
            content: content.into(),
            provenance,
        }
    }

    /// Build a history message from a tree node.
    pub fn from_node(node: &MessageNode, index: usize) -> Self {
        Self {
            role: node.role,
            content: node.content.clone(),
            provenance: Provenance {
                source_type: SourceType::History,
                source_id: node.id.clone(),
                source_index: index,
            },
        }
    }

    /// Strip provenance for hand-off to a model client.
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// The provenance-free message shape a model client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}
