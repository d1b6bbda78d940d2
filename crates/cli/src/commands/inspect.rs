//! `branchloom tree | validate | repair`: Look at and fix a session's structure.

use super::{CliResult, load_session, preview_text, short_id};
use branchloom_core::message::NodeStatus;
use branchloom_core::session::ConversationSession;
use branchloom_core::store::SessionStore;
use branchloom_tree::{
    repair as repair_session, resolve_active_path, sibling_position, validate_integrity,
};
use std::collections::HashSet;
use std::fmt::Write;

/// Render the whole tree, one node per line, children indented under their
/// parent. Nodes on the active path are starred; `[i/n]` marks a choice
/// between siblings.
pub fn render_tree(session: &ConversationSession) -> String {
    let active: HashSet<&str> = resolve_active_path(session)
        .into_iter()
        .map(|n| n.id.as_str())
        .collect();

    let mut out = String::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, usize)> = vec![(session.root_node_id.as_str(), 0)];

    while let Some((id, depth)) = stack.pop() {
        let Some(node) = session.get(id) else {
            let _ = writeln!(out, "{}? {} (missing)", "  ".repeat(depth), short_id(id));
            continue;
        };
        if !seen.insert(node.id.as_str()) {
            continue;
        }

        let marker = if active.contains(id) { '*' } else { ' ' };
        let mut line = format!("{}{marker} {} ", "  ".repeat(depth), short_id(id));
        if node.is_root() {
            line.push_str("root");
        } else {
            let _ = write!(line, "{:<9} {}", node.role.to_string(), preview_text(&node.content, 50));
            if let Some((index, count)) = sibling_position(session, id) {
                if count > 1 {
                    let _ = write!(line, " [{}/{}]", index + 1, count);
                }
            }
            match node.status {
                NodeStatus::Generating => line.push_str(" (generating)"),
                NodeStatus::Error => line.push_str(" (error)"),
                NodeStatus::Complete => {}
            }
            if !node.is_enabled {
                line.push_str(" (disabled)");
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');

        for child in node.children_ids.iter().rev() {
            stack.push((child.as_str(), depth + 1));
        }
    }
    out
}

pub async fn tree(store: &dyn SessionStore, session_id: &str) -> CliResult {
    let session = load_session(store, session_id).await?;
    if let Some(title) = &session.title {
        println!("📜 {title}");
    }
    print!("{}", render_tree(&session));
    Ok(())
}

pub async fn validate(store: &dyn SessionStore, session_id: &str) -> CliResult {
    let session = load_session(store, session_id).await?;
    let issues = validate_integrity(&session);
    if issues.is_empty() {
        println!("✅ Session {} is structurally sound ({} nodes)", session.id, session.len());
        return Ok(());
    }
    println!("❌ {} issue(s) in session {}:", issues.len(), session.id);
    for issue in &issues {
        println!("  - {issue}");
    }
    println!("\nRun `branchloom repair {session_id}` to fix them.");
    Err(format!("{} integrity issue(s)", issues.len()).into())
}

pub async fn repair(store: &dyn SessionStore, session_id: &str) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let report = repair_session(&mut session);
    if report.is_clean() {
        println!("✅ Nothing to repair");
        return Ok(());
    }
    store.save(&session).await?;
    println!("🔧 Repaired session {}", session.id);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_tree::{create_message_pair, create_regenerate_branch, soft_delete};

    #[test]
    fn empty_session_renders_root_only() {
        let session = ConversationSession::new();
        let out = render_tree(&session);
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with('*'));
        assert!(out.trim_end().ends_with("root"));
    }

    #[test]
    fn marks_active_branch_and_siblings() {
        let mut session = ConversationSession::new();
        let root = session.root_node_id.clone();
        let pair = create_message_pair(&mut session, "hello", &root).unwrap();
        let regen = create_regenerate_branch(&mut session, &pair.assistant_id).unwrap();

        let out = render_tree(&session);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);

        let first = lines.iter().find(|l| l.contains(short_id(&pair.assistant_id))).unwrap();
        let second = lines.iter().find(|l| l.contains(short_id(&regen))).unwrap();
        assert!(first.contains("[1/2]"));
        assert!(!first.trim_start().starts_with('*'));
        assert!(second.contains("[2/2]"));
        assert!(second.trim_start().starts_with('*'));
        assert!(second.contains("(generating)"));
    }

    #[test]
    fn disabled_nodes_are_labelled() {
        let mut session = ConversationSession::new();
        let root = session.root_node_id.clone();
        let pair = create_message_pair(&mut session, "hidden", &root).unwrap();
        assert!(soft_delete(&mut session, &pair.user_id));

        let out = render_tree(&session);
        assert_eq!(out.matches("(disabled)").count(), 2);
        // Children are indented one level deeper than their parent.
        let user_line = out.lines().find(|l| l.contains("hidden")).unwrap();
        assert!(user_line.starts_with("  "));
    }
}
