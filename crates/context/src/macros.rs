//! Built-in macro engines.

use async_trait::async_trait;
use branchloom_core::error::CollaboratorError;
use branchloom_core::macros::{MacroContext, MacroEngine};
use std::collections::HashMap;

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughMacros;

#[async_trait]
impl MacroEngine for PassthroughMacros {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn substitute(&self, text: &str, _ctx: &MacroContext) -> Result<String, CollaboratorError> {
        Ok(text.to_string())
    }

    async fn substitute_batch(
        &self,
        texts: &[String],
        _ctx: &MacroContext,
    ) -> Result<Vec<String>, CollaboratorError> {
        Ok(texts.to_vec())
    }
}

/// Replaces `{{name}}` macros.
///
/// Lookup order: `{{user}}` and `{{char}}` from the context names, then the
/// context variables, then the engine's own defaults. Unknown macros are left
/// as written. An unterminated `{{` is a substitution failure.
#[derive(Debug, Clone, Default)]
pub struct VariableMacros {
    defaults: HashMap<String, String>,
}

impl VariableMacros {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    fn lookup<'a>(&'a self, name: &str, ctx: &'a MacroContext) -> Option<&'a str> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "user" => ctx.user_name.as_deref(),
            "char" => ctx.char_name.as_deref(),
            _ => None,
        };
        builtin
            .or_else(|| ctx.variables.get(name).map(String::as_str))
            .or_else(|| self.defaults.get(name).map(String::as_str))
    }

    /// Single-pass expansion; substituted values are not rescanned.
    pub fn expand(&self, text: &str, ctx: &MacroContext) -> Result<String, CollaboratorError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                return Err(CollaboratorError::MacroFailed(format!(
                    "unterminated macro at byte {}",
                    text.len() - rest.len() + start
                )));
            };
            let name = after_open[..end].trim();
            match self.lookup(name, ctx) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_open[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[async_trait]
impl MacroEngine for VariableMacros {
    fn name(&self) -> &str {
        "variables"
    }

    async fn substitute(&self, text: &str, ctx: &MacroContext) -> Result<String, CollaboratorError> {
        self.expand(text, ctx)
    }
}
