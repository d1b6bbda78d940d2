//! The branching conversation tree.
//!
//! Sessions store messages in a flat arena (`id → node`) with parent/child
//! links held as ids. This crate provides the structural operations on that
//! arena, branch navigation with per-branch-point selection memory, and
//! integrity checking:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`tree`] | create / add / soft delete / hard delete / reparent |
//! | [`navigator`] | selection memory, active path, branch switching |
//! | [`integrity`] | non-mutating validation and explicit repair |
//! | [`ops`] | message pairs, regeneration, edits used by the chat UI |
//!
//! All operations are synchronous and take `&mut ConversationSession`, so a
//! caller holding the session has exclusive access for the whole call.

pub mod integrity;
pub mod navigator;
pub mod ops;
pub mod tree;

pub use integrity::{IntegrityIssue, RepairReport, repair, validate_integrity};
pub use navigator::{
    descend_to_leaf, path_to, resolve_active_path, select_branch, sibling_position,
    update_active_leaf, update_selection_memory,
};
pub use ops::{
    MessagePair, create_message_pair, create_regenerate_branch, edit_content, restore,
    set_status, soft_delete,
};
pub use tree::{
    NodeConfig, add_node, create_node, descendant_ids, disable_subtree, enable_subtree,
    hard_delete, reparent, subtree_ids,
};
