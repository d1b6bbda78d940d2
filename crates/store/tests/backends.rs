//! The same persistence checks run against every store backend.
//!
//! Sessions are built with the tree operations a chat client uses, so the
//! stored documents carry branches, selection memory and disabled nodes.

use branchloom_core::error::StoreError;
use branchloom_core::message::NodeStatus;
use branchloom_core::session::{ConversationSession, SessionId};
use branchloom_core::store::SessionStore;
use branchloom_store::{FileStore, InMemoryStore, SqliteStore};
use branchloom_tree::{
    create_message_pair, create_regenerate_branch, edit_content, resolve_active_path,
    select_branch, set_status, soft_delete, validate_integrity,
};

/// Two turns, a regenerated second answer, and a soft-deleted side branch.
fn branched_session(title: &str) -> ConversationSession {
    let mut s = ConversationSession::new();
    s.title = Some(title.to_string());
    let root = s.root_node_id.clone();

    let first = create_message_pair(&mut s, "hello", &root).unwrap();
    edit_content(&mut s, &first.assistant_id, "hi");
    set_status(&mut s, &first.assistant_id, NodeStatus::Complete);

    let second = create_message_pair(&mut s, "tell me a story", &first.assistant_id).unwrap();
    edit_content(&mut s, &second.assistant_id, "once upon a time");
    set_status(&mut s, &second.assistant_id, NodeStatus::Complete);
    let retry = create_regenerate_branch(&mut s, &second.assistant_id).unwrap();
    set_status(&mut s, &retry, NodeStatus::Error);

    let side = create_message_pair(&mut s, "never mind", &first.assistant_id).unwrap();
    soft_delete(&mut s, &side.user_id);

    select_branch(&mut s, &second.assistant_id);
    s
}

async fn exercise(store: &dyn SessionStore) {
    assert!(store.list().await.unwrap().is_empty());

    let original = branched_session("stories");
    store.save(&original).await.unwrap();

    let loaded = store.load_required(&original.id).await.unwrap();
    assert_eq!(loaded, original, "{} changed the session", store.name());
    assert!(validate_integrity(&loaded).is_empty());
    let path: Vec<&str> = resolve_active_path(&loaded)
        .iter()
        .map(|n| n.content.as_str())
        .collect();
    assert_eq!(path, vec!["", "hello", "hi", "tell me a story", "once upon a time"]);

    // Saving again replaces the stored document.
    let mut updated = loaded;
    let leaf = updated.active_leaf_id.clone();
    create_message_pair(&mut updated, "and then?", &leaf).unwrap();
    store.save(&updated).await.unwrap();
    let reloaded = store.load_required(&updated.id).await.unwrap();
    assert_eq!(reloaded.len(), original.len() + 2);

    let other = branched_session("second");
    store.save(&other).await.unwrap();
    let summaries = store.list().await.unwrap();
    assert_eq!(summaries.len(), 2);
    let stories = summaries.iter().find(|s| s.id == original.id).unwrap();
    assert_eq!(stories.title.as_deref(), Some("stories"));
    assert_eq!(stories.node_count, updated.len());

    assert!(store.delete(&original.id).await.unwrap());
    assert!(store.load(&original.id).await.unwrap().is_none());
    let err = store.load_required(&original.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert_eq!(store.list().await.unwrap().len(), 1);
    assert!(!store.delete(&SessionId::from("missing")).await.unwrap());
}

#[tokio::test]
async fn memory_backend() {
    exercise(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn file_backend() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&FileStore::new(dir.path().join("sessions"))).await;
}

#[tokio::test]
async fn sqlite_backend() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("sessions.sqlite").display());
    exercise(&SqliteStore::new(&url).await.unwrap()).await;
}

#[tokio::test]
async fn sqlite_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("sessions.sqlite").display());
    let session = branched_session("durable");
    {
        let store = SqliteStore::new(&url).await.unwrap();
        store.save(&session).await.unwrap();
    }
    let store = SqliteStore::new(&url).await.unwrap();
    assert_eq!(store.load_required(&session.id).await.unwrap(), session);
}
