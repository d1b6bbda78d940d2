//! Subcommand implementations and the helpers they share.

pub mod config_cmd;
pub mod init;
pub mod inspect;
pub mod node;
pub mod preview;
pub mod session;

use branchloom_config::AppConfig;
use branchloom_core::message::NodeId;
use branchloom_core::session::{ConversationSession, SessionId};
use branchloom_core::store::SessionStore;
use branchloom_store::{FileStore, InMemoryStore, SqliteStore};
use tracing::warn;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open the configured session store.
pub async fn open_store(config: &AppConfig) -> CliResult<Box<dyn SessionStore>> {
    let path = config.store_path();
    match config.store.backend.as_str() {
        "file" => Ok(Box::new(FileStore::new(path))),
        "sqlite" => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Box::new(SqliteStore::new(&url).await?))
        }
        "memory" => {
            warn!("Memory store selected, sessions are discarded on exit");
            Ok(Box::new(InMemoryStore::new()))
        }
        other => Err(format!("Unknown store backend: {other}").into()),
    }
}

/// Resolve a full session id or a unique prefix of one.
pub async fn resolve_session(store: &dyn SessionStore, prefix: &str) -> CliResult<SessionId> {
    let matches: Vec<SessionId> = store
        .list()
        .await?
        .into_iter()
        .map(|s| s.id)
        .filter(|id| id.0.starts_with(prefix))
        .collect();
    if let Some(exact) = matches.iter().find(|id| id.0 == prefix) {
        return Ok(exact.clone());
    }
    match matches.len() {
        0 => Err(format!("No session matches '{prefix}'").into()),
        1 => Ok(matches[0].clone()),
        n => Err(format!("'{prefix}' is ambiguous ({n} sessions match)").into()),
    }
}

pub async fn load_session(store: &dyn SessionStore, prefix: &str) -> CliResult<ConversationSession> {
    let id = resolve_session(store, prefix).await?;
    Ok(store.load_required(&id).await?)
}

/// Resolve a full node id or a unique prefix of one.
pub fn resolve_node(session: &ConversationSession, prefix: &str) -> CliResult<NodeId> {
    if session.contains(prefix) {
        return Ok(prefix.to_string());
    }
    let mut matches = session.nodes.keys().filter(|id| id.starts_with(prefix));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id.clone()),
        (None, _) => Err(format!("No node matches '{prefix}'").into()),
        (Some(_), Some(_)) => Err(format!("Node id '{prefix}' is ambiguous").into()),
    }
}

/// First eight characters of an id, for display.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Single-line preview of message content.
pub fn preview_text(content: &str, max_chars: usize) -> String {
    let flat: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}
