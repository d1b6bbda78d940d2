//! Context assembly pipeline.
//!
//! Produces the exact ordered message list for one model call from a session,
//! the target node being generated, an agent template, and an optional user
//! profile:
//!
//! 1. History: enabled user/assistant ancestors of the target
//! 2. Classify the template; resolve macros in preset and profile text
//! 3. System list from the system skeleton and the profile block
//! 4. `user_profile` anchor injections
//! 5. History compression (optional)
//! 6. Conversation list from the conversational skeleton and the history
//! 7. `chat_history` anchor injections
//! 8. Depth injections
//! 9. System list followed by conversation list
//!
//! # Determinism
//!
//! Identical inputs (and collaborator outputs) always produce identical
//! output. Stages run strictly in order since each stage's splice indices
//! depend on the lengths produced by the previous one.

use crate::classifier::{ClassifiedPreset, ClassifiedPresets, classify};
use crate::injection::{AnchorSpan, apply_anchor_injections, apply_depth_injections};
use crate::limiter::{ContextLimiter, LimiterOutcome};
use crate::macros::{PassthroughMacros, VariableMacros};
use crate::token;
use branchloom_config::{ContextConfig, LimiterConfig};
use branchloom_core::error::CollaboratorError;
use branchloom_core::macros::{MacroContext, MacroEngine};
use branchloom_core::message::{AssembledMessage, Provenance, Role, SourceType, WireMessage};
use branchloom_core::preset::{AgentTemplate, AnchorTarget, PresetKind};
use branchloom_core::session::ConversationSession;
use branchloom_core::summarizer::Summarizer;
use branchloom_tree::navigator::path_to;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source id of a profile block appended without a placeholder.
pub const PROFILE_SOURCE_ID: &str = "user_profile";

// ── Types ─────────────────────────────────────────────────────────────────

/// Errors that abort a context build.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Target node not found: {0}")]
    TargetNotFound(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Diagnostics about one assembly, for preview and debugging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMeta {
    /// Messages in the system segment (front of the list)
    pub system_count: usize,
    /// Messages in the conversation segment
    pub conversation_count: usize,
    /// History messages after compression, summary included
    pub history_count: usize,
    /// Final index of the profile block
    pub profile_index: Option<usize>,
    /// Final index where the history block starts
    pub chat_history_index: usize,
    /// The template had a chat-history placeholder
    pub history_placeholder: bool,
    /// Anchor injections that were dropped and malformed presets
    pub warnings: Vec<String>,
    pub limiter: LimiterOutcome,
    pub estimated_tokens: usize,
}

/// The assembled context, ready for a model client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub messages: Vec<AssembledMessage>,
    pub meta: AssemblyMeta,
}

impl AssembledContext {
    /// Provenance-free messages for the model client.
    pub fn to_wire(&self) -> Vec<WireMessage> {
        self.messages.iter().map(AssembledMessage::to_wire).collect()
    }

    pub fn system_messages(&self) -> &[AssembledMessage] {
        &self.messages[..self.meta.system_count.min(self.messages.len())]
    }

    pub fn conversation_messages(&self) -> &[AssembledMessage] {
        &self.messages[self.meta.system_count.min(self.messages.len())..]
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Holds no per-session state; create one and reuse it.
pub struct ContextAssembler {
    limiter: ContextLimiter,
    macros: Arc<dyn MacroEngine>,
    macro_context: MacroContext,
}

impl ContextAssembler {
    /// Assembler with the given limiter policy and no macro expansion.
    pub fn new(limiter: LimiterConfig) -> Self {
        Self {
            limiter: ContextLimiter::new(limiter),
            macros: Arc::new(PassthroughMacros),
            macro_context: MacroContext::default(),
        }
    }

    /// Assembler configured from the `[context]` section, expanding
    /// `{{user}}`/`{{char}}` and variables.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            limiter: ContextLimiter::new(config.limiter.clone()),
            macros: Arc::new(VariableMacros::new()),
            macro_context: MacroContext {
                user_name: Some(config.user_name.clone()),
                char_name: Some(config.char_name.clone()),
                ..Default::default()
            },
        }
    }

    pub fn with_macros(mut self, macros: Arc<dyn MacroEngine>) -> Self {
        self.macros = macros;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.limiter = self.limiter.with_summarizer(summarizer);
        self
    }

    /// Base macro context; the session id is filled in per build.
    pub fn with_macro_context(mut self, ctx: MacroContext) -> Self {
        self.macro_context = ctx;
        self
    }

    /// Build the message list for generating `target_node_id`.
    ///
    /// The target itself is not part of the history; its enabled
    /// user/assistant ancestors are.
    pub async fn build_context(
        &self,
        session: &ConversationSession,
        target_node_id: &str,
        template: &AgentTemplate,
        user_profile: Option<&str>,
    ) -> Result<AssembledContext, ContextError> {
        if !session.contains(target_node_id) {
            return Err(ContextError::TargetNotFound(target_node_id.to_string()));
        }
        let mut meta = AssemblyMeta::default();

        // ── 1. Session history ────────────────────────────────────────────
        let history = session_history(session, target_node_id);

        // ── 2. Classification and macros ──────────────────────────────────
        let mut classified = classify(template);
        meta.warnings.append(&mut classified.warnings);
        let mut profile = user_profile.map(str::to_string);
        self.substitute_macros(session, &mut classified, &mut profile)
            .await?;

        // ── 3. System list ────────────────────────────────────────────────
        let (mut system, profile_index) =
            build_system_list(&classified.skeleton, profile, &mut meta.warnings);

        // ── 4. user_profile anchors ───────────────────────────────────────
        let profile_group = classified.anchor_injections.group(AnchorTarget::UserProfile);
        meta.profile_index = match profile_index {
            Some(index) => {
                Some(apply_anchor_injections(AnchorSpan::new(index, 1), &mut system, profile_group).index)
            }
            None => {
                if !profile_group.is_empty() {
                    warn!(
                        dropped = profile_group.len(),
                        "No user profile in context, dropping user_profile anchor injections"
                    );
                    meta.warnings.push(format!(
                        "{} user_profile anchor injection(s) dropped: no user profile",
                        profile_group.len()
                    ));
                }
                None
            }
        };

        // ── 5. History compression ────────────────────────────────────────
        let (history, outcome) = self.limiter.apply(history).await?;
        meta.limiter = outcome;
        meta.history_count = history.len();

        // ── 6. Conversation list ──────────────────────────────────────────
        let (mut conversation, history_span, has_placeholder) =
            build_conversation_list(&classified.skeleton, history, &mut meta.warnings);
        meta.history_placeholder = has_placeholder;

        // ── 7. chat_history anchors ───────────────────────────────────────
        let history_group = classified.anchor_injections.group(AnchorTarget::ChatHistory);
        let history_span = apply_anchor_injections(history_span, &mut conversation, history_group);

        // ── 8. Depth injections ───────────────────────────────────────────
        let points = apply_depth_injections(&mut conversation, &classified.depth_injections);
        let shifted_by = points.iter().filter(|&&p| p <= history_span.index).count();

        // ── 9. Final sequence ─────────────────────────────────────────────
        meta.system_count = system.len();
        meta.conversation_count = conversation.len();
        meta.chat_history_index = meta.system_count + history_span.index + shifted_by;
        let mut messages = system;
        messages.append(&mut conversation);
        meta.estimated_tokens = token::estimate_messages_tokens(&messages);

        debug!(
            session_id = %session.id,
            target = target_node_id,
            messages = messages.len(),
            history = meta.history_count,
            tokens = meta.estimated_tokens,
            "Context assembled"
        );
        Ok(AssembledContext { messages, meta })
    }

    /// Resolve macros in every preset and injection text plus the profile,
    /// with one batch call.
    async fn substitute_macros(
        &self,
        session: &ConversationSession,
        classified: &mut ClassifiedPresets,
        profile: &mut Option<String>,
    ) -> Result<(), CollaboratorError> {
        let mut slots: Vec<&mut String> = Vec::new();
        slots.extend(
            classified
                .skeleton
                .iter_mut()
                .filter(|e| !e.preset.kind.is_placeholder())
                .map(|e| &mut e.preset.content),
        );
        let anchors = &mut classified.anchor_injections;
        for entry in anchors
            .user_profile
            .before
            .iter_mut()
            .chain(anchors.user_profile.after.iter_mut())
            .chain(anchors.chat_history.before.iter_mut())
            .chain(anchors.chat_history.after.iter_mut())
        {
            slots.push(&mut entry.preset.content);
        }
        slots.extend(
            classified
                .depth_injections
                .iter_mut()
                .map(|d| &mut d.entry.preset.content),
        );
        if let Some(p) = profile.as_mut() {
            slots.push(p);
        }
        if slots.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
        let ctx = MacroContext {
            session_id: session.id.to_string(),
            ..self.macro_context.clone()
        };
        let resolved = self.macros.substitute_batch(&texts, &ctx).await?;
        if resolved.len() != texts.len() {
            return Err(CollaboratorError::MacroFailed(format!(
                "{} returned {} texts for {} inputs",
                self.macros.name(),
                resolved.len(),
                texts.len()
            )));
        }
        for (slot, text) in slots.into_iter().zip(resolved) {
            *slot = text;
        }
        Ok(())
    }
}

// ── Pipeline stages ───────────────────────────────────────────────────────

/// Enabled user/assistant ancestors of `target_node_id`, root first.
fn session_history(session: &ConversationSession, target_node_id: &str) -> Vec<AssembledMessage> {
    let mut path = path_to(session, target_node_id);
    path.pop();
    path.into_iter()
        .filter(|n| n.is_enabled && n.role.is_conversational())
        .enumerate()
        .map(|(i, n)| AssembledMessage::from_node(n, i))
        .collect()
}

fn preset_message(entry: &ClassifiedPreset) -> AssembledMessage {
    AssembledMessage::new(
        entry.preset.role,
        entry.preset.content.clone(),
        Provenance {
            source_type: SourceType::Preset,
            source_id: entry.preset.id.clone(),
            source_index: entry.template_index,
        },
    )
}

/// System-role skeleton presets join the system block wherever they sit in
/// the template, including after the chat history placeholder.
fn belongs_to_system(entry: &ClassifiedPreset) -> bool {
    match entry.preset.kind {
        PresetKind::UserProfile => true,
        PresetKind::ChatHistory => false,
        PresetKind::Plain => entry.preset.role == Role::System,
    }
}

/// System skeleton with the profile resolved in place of its placeholder,
/// or appended when there is none. Returns the list and the profile index.
fn build_system_list(
    skeleton: &[ClassifiedPreset],
    mut profile: Option<String>,
    warnings: &mut Vec<String>,
) -> (Vec<AssembledMessage>, Option<usize>) {
    let mut list = Vec::new();
    let mut profile_index = None;
    let mut placeholder_seen = false;

    for entry in skeleton.iter().filter(|e| belongs_to_system(e)) {
        if entry.preset.kind != PresetKind::UserProfile {
            list.push(preset_message(entry));
            continue;
        }
        if placeholder_seen {
            warn!(preset_id = %entry.preset.id, "Duplicate user_profile placeholder ignored");
            warnings.push(format!(
                "preset '{}': duplicate user_profile placeholder ignored",
                entry.preset.id
            ));
            continue;
        }
        placeholder_seen = true;
        if let Some(text) = profile.take() {
            profile_index = Some(list.len());
            list.push(AssembledMessage::new(
                entry.preset.role,
                text,
                Provenance {
                    source_type: SourceType::UserProfile,
                    source_id: entry.preset.id.clone(),
                    source_index: entry.template_index,
                },
            ));
        }
    }

    if let Some(text) = profile {
        profile_index = Some(list.len());
        list.push(AssembledMessage::new(
            Role::System,
            text,
            Provenance {
                source_type: SourceType::UserProfile,
                source_id: PROFILE_SOURCE_ID.into(),
                source_index: 0,
            },
        ));
    }

    (list, profile_index)
}

/// Conversational skeleton with the history spliced at its placeholder, or
/// appended after the skeleton. Returns the list, the history span and
/// whether a placeholder was used.
fn build_conversation_list(
    skeleton: &[ClassifiedPreset],
    history: Vec<AssembledMessage>,
    warnings: &mut Vec<String>,
) -> (Vec<AssembledMessage>, AnchorSpan, bool) {
    let history_len = history.len();
    let mut history = Some(history);
    let mut list = Vec::new();
    let mut span = None;

    for entry in skeleton.iter().filter(|e| !belongs_to_system(e)) {
        if entry.preset.kind != PresetKind::ChatHistory {
            list.push(preset_message(entry));
            continue;
        }
        match history.take() {
            Some(mut block) => {
                span = Some(AnchorSpan::new(list.len(), history_len));
                list.append(&mut block);
            }
            None => {
                warn!(preset_id = %entry.preset.id, "Duplicate chat_history placeholder ignored");
                warnings.push(format!(
                    "preset '{}': duplicate chat_history placeholder ignored",
                    entry.preset.id
                ));
            }
        }
    }

    match (span, history) {
        (Some(span), _) => (list, span, true),
        (None, Some(mut block)) => {
            let span = AnchorSpan::new(list.len(), history_len);
            list.append(&mut block);
            (list, span, false)
        }
        // history is only taken when a span is recorded
        (None, None) => {
            let span = AnchorSpan::new(list.len(), 0);
            (list, span, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use branchloom_config::{CompressionStrategy, TriggerMode};
    use branchloom_core::message::NodeStatus;
    use branchloom_core::preset::{AnchorPosition, InjectionStrategy, PresetMessage};
    use branchloom_tree::ops::{create_message_pair, set_status};

    fn plain(id: &str, role: Role) -> PresetMessage {
        PresetMessage::plain(id, role, id)
    }

    fn anchor(id: &str, target: AnchorTarget, position: AnchorPosition) -> PresetMessage {
        plain(id, Role::System).with_injection(InjectionStrategy::anchor(target, position))
    }

    /// Session with `turns` completed pairs plus a pending reply; returns
    /// the session and the pending assistant id.
    fn session_with_turns(turns: usize) -> (ConversationSession, String) {
        let mut s = ConversationSession::new();
        let mut parent = s.root_node_id.clone();
        for i in 0..turns {
            let pair = create_message_pair(&mut s, &format!("q{i}"), &parent).unwrap();
            s.get_mut(&pair.assistant_id).unwrap().content = format!("a{i}");
            set_status(&mut s, &pair.assistant_id, NodeStatus::Complete);
            parent = pair.assistant_id;
        }
        let pending = create_message_pair(&mut s, "now", &parent).unwrap();
        (s, pending.assistant_id)
    }

    fn contents(ctx: &AssembledContext) -> Vec<&str> {
        ctx.messages.iter().map(|m| m.content.as_str()).collect()
    }

    fn assembler() -> ContextAssembler {
        ContextAssembler::new(LimiterConfig::default())
    }

    #[tokio::test]
    async fn unknown_target_is_an_error() {
        let (s, _) = session_with_turns(0);
        let err = assembler()
            .build_context(&s, "missing", &AgentTemplate::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::TargetNotFound(_)));
    }

    #[tokio::test]
    async fn history_excludes_target_and_system_root() {
        let (s, target) = session_with_turns(1);
        let ctx = assembler()
            .build_context(&s, &target, &AgentTemplate::default(), None)
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["q0", "a0", "now"]);
        assert!(ctx.messages.iter().all(|m| m.provenance.source_type == SourceType::History));
        assert_eq!(ctx.meta.history_count, 3);
        assert_eq!(ctx.meta.system_count, 0);
    }

    #[tokio::test]
    async fn disabled_ancestors_are_skipped() {
        let (mut s, target) = session_with_turns(2);
        let a0 = s
            .nodes
            .values()
            .find(|n| n.content == "a0")
            .map(|n| n.id.clone())
            .unwrap();
        // Flip only a0 so the path to the target stays intact.
        s.get_mut(&a0).unwrap().is_enabled = false;
        let ctx = assembler()
            .build_context(&s, &target, &AgentTemplate::default(), None)
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["q0", "q1", "a1", "now"]);
    }

    #[tokio::test]
    async fn profile_replaces_placeholder_with_anchors() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            plain("A", Role::System),
            PresetMessage::user_profile_placeholder("profile"),
            plain("B", Role::System),
            anchor("before", AnchorTarget::UserProfile, AnchorPosition::Before),
            anchor("after", AnchorTarget::UserProfile, AnchorPosition::After),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, Some("user_profile"))
            .await
            .unwrap();
        assert_eq!(
            contents(&ctx),
            vec!["A", "before", "user_profile", "after", "B", "now"]
        );
        assert_eq!(ctx.meta.profile_index, Some(2));
        assert_eq!(ctx.meta.system_count, 5);
        assert_eq!(ctx.messages[2].provenance.source_type, SourceType::UserProfile);
        assert_eq!(ctx.messages[2].provenance.source_id, "profile");
    }

    #[tokio::test]
    async fn profile_without_placeholder_is_appended() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![plain("main", Role::System)]);
        let ctx = assembler()
            .build_context(&s, &target, &template, Some("likes tea"))
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["main", "likes tea", "now"]);
        assert_eq!(ctx.meta.profile_index, Some(1));
        assert_eq!(ctx.messages[1].provenance.source_id, PROFILE_SOURCE_ID);
    }

    #[tokio::test]
    async fn profile_anchors_without_profile_are_dropped_with_warning() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            plain("main", Role::System),
            PresetMessage::user_profile_placeholder("profile"),
            anchor("after", AnchorTarget::UserProfile, AnchorPosition::After),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["main", "now"]);
        assert_eq!(ctx.meta.profile_index, None);
        assert_eq!(ctx.meta.warnings.len(), 1);
    }

    #[tokio::test]
    async fn history_spliced_at_placeholder_with_anchors() {
        let (s, target) = session_with_turns(1);
        let template = AgentTemplate::new(vec![
            plain("sys", Role::System),
            plain("example_q", Role::User),
            PresetMessage::chat_history_placeholder("history"),
            plain("post", Role::Assistant),
            anchor("pre_hist", AnchorTarget::ChatHistory, AnchorPosition::Before),
            anchor("post_hist", AnchorTarget::ChatHistory, AnchorPosition::After),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        assert_eq!(
            contents(&ctx),
            vec!["sys", "example_q", "pre_hist", "q0", "a0", "now", "post_hist", "post"]
        );
        assert!(ctx.meta.history_placeholder);
        assert_eq!(ctx.meta.chat_history_index, 3);
    }

    #[tokio::test]
    async fn history_anchor_falls_back_to_implicit_block() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            plain("example", Role::User),
            anchor("pre_hist", AnchorTarget::ChatHistory, AnchorPosition::Before),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["example", "pre_hist", "now"]);
        assert!(!ctx.meta.history_placeholder);
    }

    #[tokio::test]
    async fn depth_counts_against_anchor_expanded_list() {
        let (s, target) = session_with_turns(1);
        let template = AgentTemplate::new(vec![
            PresetMessage::chat_history_placeholder("history"),
            anchor("post_hist", AnchorTarget::ChatHistory, AnchorPosition::After),
            plain("note", Role::System).with_injection(InjectionStrategy::depth(2)),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        // [q0, a0, now, post_hist] → note leaves two messages after it.
        assert_eq!(contents(&ctx), vec!["q0", "a0", "note", "now", "post_hist"]);
        assert_eq!(ctx.messages[2].provenance.source_type, SourceType::DepthInjection);
    }

    #[tokio::test]
    async fn history_index_follows_depth_injections_placed_ahead_of_it() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            plain("example", Role::User),
            PresetMessage::chat_history_placeholder("history"),
            plain("far", Role::System).with_injection(InjectionStrategy::depth(10)),
            plain("tail", Role::System).with_injection(InjectionStrategy::depth(0)),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["far", "example", "now", "tail"]);
        assert_eq!(ctx.meta.chat_history_index, 2);
        assert_eq!(ctx.messages[ctx.meta.chat_history_index].content, "now");
    }

    #[tokio::test]
    async fn system_presets_after_history_placeholder_move_to_system_block() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            plain("intro", Role::System),
            PresetMessage::chat_history_placeholder("history"),
            plain("closing", Role::System),
        ]);
        let ctx = assembler()
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        // Only depth injections can place system text after the history.
        assert_eq!(contents(&ctx), vec!["intro", "closing", "now"]);
        assert_eq!(ctx.meta.system_count, 2);
        assert_eq!(ctx.meta.chat_history_index, 2);
    }

    #[tokio::test]
    async fn macros_resolve_preset_and_profile_text() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![
            PresetMessage::plain("main", Role::System, "You are {{char}}."),
            PresetMessage::user_profile_placeholder("profile"),
        ]);
        let assembler = ContextAssembler::from_config(&ContextConfig {
            user_name: "Ada".into(),
            char_name: "Loom".into(),
            ..Default::default()
        });
        let ctx = assembler
            .build_context(&s, &target, &template, Some("{{user}} likes tea"))
            .await
            .unwrap();
        assert_eq!(contents(&ctx), vec!["You are Loom.", "Ada likes tea", "now"]);
    }

    struct BrokenMacros;

    #[async_trait]
    impl MacroEngine for BrokenMacros {
        fn name(&self) -> &str {
            "broken"
        }

        async fn substitute(
            &self,
            _text: &str,
            _ctx: &MacroContext,
        ) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::MacroFailed("engine offline".into()))
        }
    }

    #[tokio::test]
    async fn macro_failure_propagates() {
        let (s, target) = session_with_turns(0);
        let template = AgentTemplate::new(vec![plain("main", Role::System)]);
        let err = assembler()
            .with_macros(Arc::new(BrokenMacros))
            .build_context(&s, &target, &template, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContextError::Collaborator(CollaboratorError::MacroFailed(_))
        ));
    }

    #[tokio::test]
    async fn limiter_only_touches_history() {
        let (s, target) = session_with_turns(6);
        let template = AgentTemplate::new(vec![
            plain("sys", Role::System),
            plain("example", Role::User),
            plain("note", Role::System).with_injection(InjectionStrategy::depth(0)),
        ]);
        let assembler = ContextAssembler::new(LimiterConfig {
            enabled: true,
            mode: TriggerMode::Messages,
            message_threshold: 10,
            protect_recent_count: 3,
            compress_count: 4,
            min_history_count: 5,
            strategy: CompressionStrategy::Truncate,
            ..Default::default()
        });
        let ctx = assembler
            .build_context(&s, &target, &template, None)
            .await
            .unwrap();
        // 13 history messages, 4 oldest dropped.
        assert_eq!(ctx.meta.limiter.removed, 4);
        assert_eq!(ctx.meta.history_count, 9);
        assert_eq!(&contents(&ctx)[..3], &["sys", "example", "q2"]);
        assert_eq!(contents(&ctx).last(), Some(&"note"));
    }

    #[tokio::test]
    async fn assembly_is_deterministic() {
        let (s, target) = session_with_turns(3);
        let template = AgentTemplate::new(vec![
            plain("sys", Role::System),
            PresetMessage::user_profile_placeholder("profile"),
            PresetMessage::chat_history_placeholder("history"),
            plain("d", Role::System).with_injection(InjectionStrategy::depth(1)),
        ]);
        let a = assembler()
            .build_context(&s, &target, &template, Some("p"))
            .await
            .unwrap();
        let b = assembler()
            .build_context(&s, &target, &template, Some("p"))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_wire().len(), a.messages.len());
        assert_eq!(a.system_messages().len(), 2);
    }
}
