//! Summarizer trait: text generation for history compression.
//!
//! The context limiter decides *whether* and *how much* history to compress;
//! producing the summary text is delegated here (usually backed by a cheap
//! model call owned by the caller).

use crate::error::CollaboratorError;
use crate::message::AssembledMessage;
use async_trait::async_trait;

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// A human-readable name for this summarizer.
    fn name(&self) -> &str;

    /// Summarize `messages` (oldest first) using `prompt_template`.
    async fn summarize(
        &self,
        messages: &[AssembledMessage],
        prompt_template: &str,
    ) -> std::result::Result<String, CollaboratorError>;
}
