//! File-based session store: one pretty-printed JSON document per session.
//!
//! Storage location: `~/.branchloom/sessions/<id>.json`
//!
//! Writes go to a temporary sibling file that is then renamed over the
//! target.

use async_trait::async_trait;
use branchloom_core::error::StoreError;
use branchloom_core::session::{ConversationSession, SessionId, SessionSummary};
use branchloom_core::store::SessionStore;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory of `<session id>.json` files.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File session store opened");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a session's document. Ids that could escape the directory
    /// are rejected.
    fn session_path(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        let valid = !id.0.is_empty()
            && id
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Storage(format!("Invalid session id '{id}'")));
        }
        Ok(self.dir.join(format!("{}.json", id.0)))
    }

    async fn read_session(path: &Path) -> Result<Option<ConversationSession>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                id: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl SessionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), StoreError> {
        let path = self.session_path(&session.id)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(session)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize session: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write session file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace session file: {e}")))?;

        debug!(session_id = %session.id, nodes = session.len(), "Session saved");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        let path = self.session_path(id)?;
        Self::read_session(&path).await
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let path = self.session_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Storage(format!(
                "Failed to delete session file: {e}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            // Nothing saved yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read session directory: {e}"
                )));
            }
        };

        let mut summaries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to read session directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_session(&path).await {
                Ok(Some(session)) => summaries.push(SessionSummary::from(&session)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupted session file"),
            }
        }

        crate::sort_summaries(&mut summaries);
        Ok(summaries)
    }
}
