//! Session store trait: persistence for conversation sessions.
//!
//! Any backing store is acceptable as long as a session round-trips with its
//! structure intact: `{id, root_node_id, active_leaf_id, nodes,
//! selection_memory, updated_at}`. Stores own session destruction.
//!
//! Implementations: in-memory (for testing), JSON files, SQLite.

use crate::error::StoreError;
use crate::session::{ConversationSession, SessionId, SessionSummary};
use async_trait::async_trait;

/// The core SessionStore trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "memory").
    fn name(&self) -> &str;

    /// Insert or replace a session.
    async fn save(&self, session: &ConversationSession) -> std::result::Result<(), StoreError>;

    /// Load a session by ID.
    async fn load(
        &self,
        id: &SessionId,
    ) -> std::result::Result<Option<ConversationSession>, StoreError>;

    /// Delete a session by ID. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> std::result::Result<bool, StoreError>;

    /// List stored sessions, most recently updated first.
    async fn list(&self) -> std::result::Result<Vec<SessionSummary>, StoreError>;

    /// Load a session or fail with `StoreError::NotFound`.
    async fn load_required(
        &self,
        id: &SessionId,
    ) -> std::result::Result<ConversationSession, StoreError> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
