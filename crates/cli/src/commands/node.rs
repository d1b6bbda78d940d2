//! Turn and branch commands: `say`, `reply`, `regen`, `edit`, `delete`,
//! `restore`, `move`, `select`.
//!
//! Each command loads the session, applies one tree operation and saves it
//! back. Rejected operations are reported as errors and nothing is saved.

use super::{CliResult, load_session, resolve_node, short_id};
use branchloom_core::message::{NodeStatus, Role};
use branchloom_core::session::ConversationSession;
use branchloom_core::store::SessionStore;
use branchloom_tree::{
    create_message_pair, create_regenerate_branch, edit_content, hard_delete, reparent,
    select_branch, set_status, soft_delete,
};
use tracing::info;

async fn commit(store: &dyn SessionStore, session: &ConversationSession) -> CliResult {
    store.save(session).await?;
    Ok(())
}

pub async fn say(
    store: &dyn SessionStore,
    session_id: &str,
    text: &str,
    parent: Option<&str>,
) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let parent = match parent {
        Some(p) => resolve_node(&session, p)?,
        None => session.active_leaf_id.clone(),
    };
    let pair = create_message_pair(&mut session, text, &parent)
        .ok_or_else(|| format!("Cannot add a turn under {}", short_id(&parent)))?;
    commit(store, &session).await?;
    println!("user       {}", pair.user_id);
    println!("assistant  {}  (generating)", pair.assistant_id);
    Ok(())
}

pub async fn reply(
    store: &dyn SessionStore,
    session_id: &str,
    node: &str,
    text: &str,
    failed: bool,
) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    let status = if failed {
        NodeStatus::Error
    } else {
        NodeStatus::Complete
    };
    if session.get(&node).map(|n| n.role) != Some(Role::Assistant) {
        return Err(format!("{} is not an assistant reply", short_id(&node)).into());
    }
    edit_content(&mut session, &node, text);
    set_status(&mut session, &node, status);
    commit(store, &session).await?;
    info!(node_id = %node, ?status, "Reply recorded");
    println!("✅ {} is now {:?}", short_id(&node), status);
    Ok(())
}

pub async fn regen(store: &dyn SessionStore, session_id: &str, node: &str) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    let new_id = create_regenerate_branch(&mut session, &node)
        .ok_or("Only user and assistant nodes can be regenerated")?;
    commit(store, &session).await?;
    println!("assistant  {new_id}  (generating)");
    Ok(())
}

pub async fn edit(store: &dyn SessionStore, session_id: &str, node: &str, text: &str) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    if !edit_content(&mut session, &node, text) {
        return Err(format!("Cannot edit {}", short_id(&node)).into());
    }
    commit(store, &session).await?;
    println!("✏️  Edited {}", short_id(&node));
    Ok(())
}

pub async fn delete(store: &dyn SessionStore, session_id: &str, node: &str, hard: bool) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    let before = session.len();
    let ok = if hard {
        hard_delete(&mut session, &node)
    } else {
        soft_delete(&mut session, &node)
    };
    if !ok {
        return Err("The root node cannot be deleted".into());
    }
    commit(store, &session).await?;
    if hard {
        println!(
            "🗑️  Removed {} node(s); active leaf is now {}",
            before - session.len(),
            short_id(&session.active_leaf_id)
        );
    } else {
        println!("🙈 Disabled {} and its branch", short_id(&node));
    }
    Ok(())
}

pub async fn restore(store: &dyn SessionStore, session_id: &str, node: &str) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    if !branchloom_tree::restore(&mut session, &node) {
        return Err(format!("Cannot restore {}", short_id(&node)).into());
    }
    commit(store, &session).await?;
    println!("♻️  Restored {} and its branch", short_id(&node));
    Ok(())
}

pub async fn move_node(
    store: &dyn SessionStore,
    session_id: &str,
    node: &str,
    new_parent: &str,
) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    let new_parent = resolve_node(&session, new_parent)?;
    if !reparent(&mut session, &node, &new_parent) {
        return Err(format!(
            "Cannot move {} under {}: the root cannot move and a node cannot move into its own branch",
            short_id(&node),
            short_id(&new_parent)
        )
        .into());
    }
    commit(store, &session).await?;
    println!("↪️  Moved {} under {}", short_id(&node), short_id(&new_parent));
    Ok(())
}

pub async fn select(store: &dyn SessionStore, session_id: &str, node: &str) -> CliResult {
    let mut session = load_session(store, session_id).await?;
    let node = resolve_node(&session, node)?;
    let leaf = select_branch(&mut session, &node).ok_or("Node disappeared while selecting")?;
    commit(store, &session).await?;
    println!("👉 Active leaf: {leaf}");
    Ok(())
}
