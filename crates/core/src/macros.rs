//! Macro engine trait: template placeholder substitution.
//!
//! Preset, injection and profile text may contain macros (`{{user}}`,
//! `{{char}}`, custom variables). The context pipeline resolves them through
//! this collaborator before assembly. Implementations live in the context
//! crate; callers may plug in their own.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Values available to macros during one context build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroContext {
    /// Session being assembled
    #[serde(default)]
    pub session_id: String,

    /// Display name of the user (`{{user}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Display name of the agent (`{{char}}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_name: Option<String>,

    /// Free-form variables (`{{name}}`)
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// The core MacroEngine trait.
#[async_trait]
pub trait MacroEngine: Send + Sync {
    /// A human-readable name for this engine.
    fn name(&self) -> &str;

    /// Substitute macros in a single text.
    async fn substitute(
        &self,
        text: &str,
        ctx: &MacroContext,
    ) -> std::result::Result<String, CollaboratorError>;

    /// Substitute macros in many texts, preserving order.
    ///
    /// Default implementation calls `substitute()` sequentially.
    async fn substitute_batch(
        &self,
        texts: &[String],
        ctx: &MacroContext,
    ) -> std::result::Result<Vec<String>, CollaboratorError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.substitute(text, ctx).await?);
        }
        Ok(out)
    }
}
