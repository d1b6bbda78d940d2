//! `branchloom preview`: Print the context a model call for a node would receive.

use super::{CliResult, load_session, preview_text, resolve_node, short_id};
use branchloom_config::AppConfig;
use branchloom_context::{AssembledContext, ContextAssembler};
use branchloom_core::message::SourceType;
use branchloom_core::preset::AgentTemplate;
use branchloom_core::store::SessionStore;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct PreviewOptions {
    pub template: Option<PathBuf>,
    pub target: Option<String>,
    pub profile: Option<String>,
    pub profile_file: Option<PathBuf>,
    pub json: bool,
    pub wire: bool,
}

pub async fn run(
    config: &AppConfig,
    store: &dyn SessionStore,
    session_id: &str,
    options: PreviewOptions,
) -> CliResult {
    let session = load_session(store, session_id).await?;
    let target = match &options.target {
        Some(t) => resolve_node(&session, t)?,
        None => session.active_leaf_id.clone(),
    };

    let template_path = options
        .template
        .clone()
        .or_else(|| Some(AppConfig::config_dir().join("template.json")).filter(|p| p.exists()));
    let template = match &template_path {
        Some(path) => load_template(path)?,
        None => AgentTemplate::default(),
    };

    let profile = match (&options.profile, &options.profile_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(|e| {
            format!("Failed to read profile {}: {e}", path.display())
        })?),
        (None, None) => None,
    };

    debug!(
        session_id = %session.id,
        target = %target,
        template = %template.id,
        "Assembling preview"
    );
    let assembler = ContextAssembler::from_config(&config.context);
    let ctx = assembler
        .build_context(&session, &target, &template, profile.as_deref())
        .await?;

    if options.wire {
        println!("{}", serde_json::to_string_pretty(&ctx.to_wire())?);
    } else if options.json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else {
        print!("{}", render_context(&ctx));
    }
    Ok(())
}

fn load_template(path: &Path) -> CliResult<AgentTemplate> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read template {}: {e}", path.display()))?;
    let template = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse template {}: {e}", path.display()))?;
    Ok(template)
}

fn source_label(source: SourceType) -> &'static str {
    match source {
        SourceType::Preset => "preset",
        SourceType::UserProfile => "profile",
        SourceType::History => "history",
        SourceType::AnchorInjection => "anchor",
        SourceType::DepthInjection => "depth",
        SourceType::Summary => "summary",
    }
}

/// Human-readable listing: one line per message, a divider between the
/// system block and the conversation, then the assembly notes.
pub fn render_context(ctx: &AssembledContext) -> String {
    let mut out = String::new();
    for (i, message) in ctx.messages.iter().enumerate() {
        if i == ctx.meta.system_count && i > 0 {
            out.push_str("  ──────── conversation ────────\n");
        }
        out.push_str(&format!(
            "  {i:>3}  {:<9} {:<8} {:<10} {}\n",
            message.role.to_string(),
            source_label(message.provenance.source_type),
            short_id(&message.provenance.source_id),
            preview_text(&message.content, 60)
        ));
    }

    let meta = &ctx.meta;
    out.push_str(&format!(
        "\n📐 {} system + {} conversation messages, ~{} tokens\n",
        meta.system_count, meta.conversation_count, meta.estimated_tokens
    ));
    out.push_str(&format!(
        "   History: {} message(s) at index {}{}\n",
        meta.history_count,
        meta.chat_history_index,
        if meta.history_placeholder {
            ""
        } else {
            " (no placeholder, appended)"
        }
    ));
    if meta.limiter.triggered {
        out.push_str(&format!(
            "   ✂️  Limiter removed {} message(s){} ({} → {} tokens)\n",
            meta.limiter.removed,
            if meta.limiter.summarized { " into a summary" } else { "" },
            meta.limiter.tokens_before,
            meta.limiter.tokens_after
        ));
    }
    for warning in &meta.warnings {
        out.push_str(&format!("   ⚠️  {warning}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_config::LimiterConfig;
    use branchloom_core::message::Role;
    use branchloom_core::preset::PresetMessage;
    use branchloom_core::session::ConversationSession;
    use branchloom_tree::create_message_pair;

    #[tokio::test]
    async fn render_separates_system_and_conversation() {
        let mut session = ConversationSession::new();
        let root = session.root_node_id.clone();
        let pair = create_message_pair(&mut session, "what's new?", &root).unwrap();
        let template = AgentTemplate {
            id: "t".into(),
            name: "T".into(),
            messages: vec![
                PresetMessage::plain("main", Role::System, "Be brief."),
                PresetMessage::chat_history_placeholder("history"),
            ],
        };
        let ctx = ContextAssembler::new(LimiterConfig::default())
            .build_context(&session, &pair.assistant_id, &template, None)
            .await
            .unwrap();

        let out = render_context(&ctx);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("Be brief."));
        assert!(lines[0].contains("preset"));
        assert!(lines[1].contains("conversation"));
        assert!(lines[2].contains("what's new?"));
        assert!(lines[2].contains("history"));
        assert!(out.contains("1 system + 1 conversation"));
    }

    #[test]
    fn template_file_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[not a template").unwrap();
        let err = load_template(&path).unwrap_err().to_string();
        assert!(err.contains("bad.json"));
    }
}
