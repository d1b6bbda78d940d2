//! History compression.
//!
//! Decides whether the session history is long enough to compress, how many
//! of the oldest messages go, and where a summary is reinserted. Summary text
//! itself comes from the [`Summarizer`] collaborator.

use crate::token;
use branchloom_config::{CompressionStrategy, LimiterConfig, TriggerMode};
use branchloom_core::error::CollaboratorError;
use branchloom_core::message::{AssembledMessage, Provenance, SourceType};
use branchloom_core::summarizer::Summarizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source id given to the synthetic summary message.
pub const SUMMARY_SOURCE_ID: &str = "history_summary";

/// What the limiter did during one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterOutcome {
    /// A threshold was met and the history was long enough to act on
    pub triggered: bool,
    /// Oldest history messages removed
    pub removed: usize,
    /// A summary message replaced the removed messages
    pub summarized: bool,
    pub history_before: usize,
    pub history_after: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
}

/// How many of the oldest messages to compress, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPlan {
    pub remove: usize,
}

pub struct ContextLimiter {
    config: LimiterConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ContextLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            summarizer: None,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Whether a configured threshold is met. Either one suffices in
    /// [`TriggerMode::Both`].
    pub fn threshold_met(&self, history: &[AssembledMessage]) -> bool {
        let by_tokens = || token::estimate_messages_tokens(history) >= self.config.token_threshold;
        let by_messages = || history.len() >= self.config.message_threshold;
        match self.config.mode {
            TriggerMode::Tokens => by_tokens(),
            TriggerMode::Messages => by_messages(),
            TriggerMode::Both => by_messages() || by_tokens(),
        }
    }

    /// Decide how much to compress. `None` means leave the history alone.
    pub fn plan(&self, history: &[AssembledMessage]) -> Option<CompressionPlan> {
        if !self.config.enabled || history.len() < self.config.min_history_count {
            return None;
        }
        if !self.threshold_met(history) {
            return None;
        }
        let eligible = history
            .len()
            .saturating_sub(self.config.protect_recent_count);
        Some(CompressionPlan {
            remove: eligible.min(self.config.compress_count),
        })
    }

    /// Apply the plan to `history`.
    ///
    /// With the summarize strategy the removed messages are replaced by one
    /// summary message placed immediately before the first retained message.
    /// Without a summarizer the limiter falls back to truncation.
    pub async fn apply(
        &self,
        mut history: Vec<AssembledMessage>,
    ) -> Result<(Vec<AssembledMessage>, LimiterOutcome), CollaboratorError> {
        let mut outcome = LimiterOutcome {
            history_before: history.len(),
            tokens_before: token::estimate_messages_tokens(&history),
            ..Default::default()
        };

        let Some(plan) = self.plan(&history) else {
            outcome.history_after = outcome.history_before;
            outcome.tokens_after = outcome.tokens_before;
            return Ok((history, outcome));
        };
        outcome.triggered = true;

        if plan.remove > 0 {
            let removed: Vec<AssembledMessage> = history.drain(..plan.remove).collect();
            outcome.removed = removed.len();

            if let Some(summary) = self.summarize(&removed).await? {
                history.insert(0, summary);
                outcome.summarized = true;
            }
        }

        outcome.history_after = history.len();
        outcome.tokens_after = token::estimate_messages_tokens(&history);
        debug!(
            removed = outcome.removed,
            summarized = outcome.summarized,
            tokens_before = outcome.tokens_before,
            tokens_after = outcome.tokens_after,
            "History compressed"
        );
        Ok((history, outcome))
    }

    async fn summarize(
        &self,
        removed: &[AssembledMessage],
    ) -> Result<Option<AssembledMessage>, CollaboratorError> {
        if self.config.strategy != CompressionStrategy::Summarize {
            return Ok(None);
        }
        let Some(summarizer) = &self.summarizer else {
            warn!("Summarize strategy configured without a summarizer, truncating instead");
            return Ok(None);
        };

        let text = summarizer
            .summarize(removed, &self.config.summary_prompt)
            .await?;
        if text.trim().is_empty() {
            warn!(summarizer = summarizer.name(), "Summarizer returned empty text, truncating instead");
            return Ok(None);
        }

        Ok(Some(AssembledMessage::new(
            self.config.summary_role,
            text,
            Provenance {
                source_type: SourceType::Summary,
                source_id: SUMMARY_SOURCE_ID.into(),
                source_index: 0,
            },
        )))
    }
}
