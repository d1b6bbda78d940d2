//! Session-level message operations used by the chat UI.
//!
//! Thin compositions of the tree and navigator primitives. Like them, these
//! return `bool`/`Option` for expected failures instead of erroring.

use crate::navigator::update_active_leaf;
use crate::tree::{NodeConfig, add_node, create_node, disable_subtree, enable_subtree};
use branchloom_core::message::{NodeId, NodeStatus, Role};
use branchloom_core::session::ConversationSession;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ids of a freshly created user turn and its pending reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePair {
    pub user_id: NodeId,
    pub assistant_id: NodeId,
}

/// Append a user turn under `parent_id` plus a generating assistant child,
/// and make the assistant the active leaf.
pub fn create_message_pair(
    session: &mut ConversationSession,
    content: &str,
    parent_id: &str,
) -> Option<MessagePair> {
    if !session.contains(parent_id) {
        return None;
    }
    let user = create_node(NodeConfig::new(Role::User, content).parent(parent_id));
    let user_id = user.id.clone();
    let assistant = create_node(
        NodeConfig::new(Role::Assistant, "")
            .parent(user_id.clone())
            .status(NodeStatus::Generating),
    );
    let assistant_id = assistant.id.clone();

    if !add_node(session, user) || !add_node(session, assistant) {
        return None;
    }
    update_active_leaf(session, &assistant_id);
    debug!(user_id = %user_id, assistant_id = %assistant_id, "Message pair created");
    Some(MessagePair {
        user_id,
        assistant_id,
    })
}

/// Start a new generating assistant reply alongside existing ones.
///
/// From an assistant node the new reply becomes its sibling; from a user node
/// it becomes a new child. Existing replies are left untouched.
pub fn create_regenerate_branch(
    session: &mut ConversationSession,
    node_id: &str,
) -> Option<NodeId> {
    let node = session.get(node_id)?;
    let parent_id = match node.role {
        Role::Assistant => node.parent_id.clone()?,
        Role::User => node.id.clone(),
        Role::System => return None,
    };
    let reply = create_node(
        NodeConfig::new(Role::Assistant, "")
            .parent(parent_id)
            .status(NodeStatus::Generating),
    );
    let reply_id = reply.id.clone();
    if !add_node(session, reply) {
        return None;
    }
    update_active_leaf(session, &reply_id);
    debug!(from = node_id, reply_id = %reply_id, "Regenerate branch created");
    Some(reply_id)
}

/// Disable a node and its descendants. The root cannot be soft-deleted.
pub fn soft_delete(session: &mut ConversationSession, node_id: &str) -> bool {
    if node_id == session.root_node_id {
        return false;
    }
    disable_subtree(session, node_id)
}

/// Re-enable a soft-deleted node and its descendants.
pub fn restore(session: &mut ConversationSession, node_id: &str) -> bool {
    enable_subtree(session, node_id)
}

/// Replace a node's content in place (message edit).
pub fn edit_content(session: &mut ConversationSession, node_id: &str, content: &str) -> bool {
    let Some(node) = session.get_mut(node_id) else {
        return false;
    };
    node.content = content.to_string();
    session.touch();
    true
}

/// Update a node's generation status, e.g. when a stream finishes or fails.
pub fn set_status(session: &mut ConversationSession, node_id: &str, status: NodeStatus) -> bool {
    let Some(node) = session.get_mut(node_id) else {
        return false;
    };
    node.status = status;
    session.touch();
    true
}
