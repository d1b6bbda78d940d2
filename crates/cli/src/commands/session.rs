//! `branchloom new | list | remove`: Session management.

use super::{CliResult, preview_text, resolve_session, short_id};
use branchloom_core::session::ConversationSession;
use branchloom_core::store::SessionStore;

pub async fn new(store: &dyn SessionStore, title: Option<String>) -> CliResult {
    let mut session = ConversationSession::new();
    session.title = title;
    store.save(&session).await?;
    println!("{}", session.id);
    Ok(())
}

pub async fn list(store: &dyn SessionStore) -> CliResult {
    let sessions = store.list().await?;
    if sessions.is_empty() {
        println!("No sessions yet. Start one with `branchloom new`.");
        return Ok(());
    }
    for s in &sessions {
        println!(
            "  {}  {:>4} nodes  {}  {}",
            short_id(&s.id.0),
            s.node_count,
            s.updated_at.format("%Y-%m-%d %H:%M"),
            preview_text(s.title.as_deref().unwrap_or("(untitled)"), 48)
        );
    }
    Ok(())
}

pub async fn remove(store: &dyn SessionStore, prefix: &str, confirm: bool) -> CliResult {
    let id = resolve_session(store, prefix).await?;
    if !confirm {
        println!("⚠️  This will delete session {id} permanently.");
        println!("   Run with --confirm to proceed:");
        println!("   branchloom remove {prefix} --confirm");
        return Ok(());
    }
    if store.delete(&id).await? {
        println!("🗑️  Deleted session {id}");
    } else {
        println!("Session {id} was already gone");
    }
    Ok(())
}
