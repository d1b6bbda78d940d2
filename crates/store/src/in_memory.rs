//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use branchloom_core::error::StoreError;
use branchloom_core::session::{ConversationSession, SessionId, SessionSummary};
use branchloom_core::store::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sessions kept in a map; nothing survives the process.
pub struct InMemoryStore {
    sessions: Arc<RwLock<HashMap<SessionId, ConversationSession>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionSummary::from)
            .collect();
        crate::sort_summaries(&mut summaries);
        Ok(summaries)
    }
}
