//! Property-style tests: long mixed sequences of tree operations must never
//! break the structural invariants.

use branchloom_core::message::{NodeId, NodeStatus, Role};
use branchloom_core::session::ConversationSession;
use branchloom_tree::{
    NodeConfig, add_node, create_message_pair, create_node, create_regenerate_branch,
    descendant_ids, disable_subtree, edit_content, hard_delete, reparent, resolve_active_path,
    restore, select_branch, set_status, soft_delete, update_active_leaf, update_selection_memory,
    validate_integrity,
};
use chrono::{DateTime, Utc};

/// Small deterministic generator so failures are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick<'a>(&mut self, ids: &'a [NodeId]) -> &'a NodeId {
        &ids[(self.next() as usize) % ids.len()]
    }
}

fn all_ids(session: &ConversationSession) -> Vec<NodeId> {
    let mut ids: Vec<NodeId> = session.nodes.keys().cloned().collect();
    ids.sort();
    ids
}

fn path_ids(session: &ConversationSession) -> Vec<NodeId> {
    resolve_active_path(session)
        .iter()
        .map(|n| n.id.clone())
        .collect()
}

#[test]
fn random_operation_sequences_preserve_integrity() {
    for seed in 1..=20u64 {
        let mut rng = Lcg(seed);
        let mut session = ConversationSession::new();

        for step in 0..300 {
            let ids = all_ids(&session);
            let target = rng.pick(&ids).clone();
            match rng.next() % 6 {
                0 | 1 => {
                    create_message_pair(&mut session, &format!("msg {step}"), &target);
                }
                2 => {
                    create_regenerate_branch(&mut session, &target);
                }
                3 => {
                    let other = rng.pick(&ids).clone();
                    let before = session.clone();
                    let would_cycle = target == other
                        || target == session.root_node_id
                        || descendant_ids(&session, &target).contains(&other);
                    let moved = reparent(&mut session, &target, &other);
                    assert_eq!(moved, !would_cycle, "seed {seed} step {step}");
                    if !moved {
                        assert_eq!(session, before);
                    }
                }
                4 => {
                    if ids.len() > 8 {
                        hard_delete(&mut session, &target);
                    }
                }
                _ => {
                    if rng.next() % 2 == 0 {
                        soft_delete(&mut session, &target);
                    } else {
                        select_branch(&mut session, &target);
                    }
                }
            }

            let issues = validate_integrity(&session);
            assert!(issues.is_empty(), "seed {seed} step {step}: {issues:?}");
        }
    }
}

#[test]
fn hard_delete_root_never_mutates() {
    let mut session = ConversationSession::new();
    let root = session.root_node_id.clone();
    let pair = create_message_pair(&mut session, "hello", &root).unwrap();
    create_regenerate_branch(&mut session, &pair.assistant_id);

    let before = serde_json::to_vec(&session).unwrap();
    assert!(!hard_delete(&mut session, &root));
    let after = serde_json::to_vec(&session).unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&before).unwrap(),
        serde_json::from_slice::<serde_json::Value>(&after).unwrap()
    );
}

#[test]
fn serialization_roundtrip_preserves_active_path() {
    let mut session = ConversationSession::new();
    let root = session.root_node_id.clone();
    let first = create_message_pair(&mut session, "first", &root).unwrap();
    let second = create_message_pair(&mut session, "second", &first.assistant_id).unwrap();
    create_regenerate_branch(&mut session, &first.assistant_id);
    // Go back to the original first answer's continuation.
    update_selection_memory(&mut session, &second.assistant_id);

    let json = serde_json::to_string_pretty(&session).unwrap();
    let restored: ConversationSession = serde_json::from_str(&json).unwrap();

    assert!(validate_integrity(&restored).is_empty());
    assert_eq!(path_ids(&restored), path_ids(&session));
    assert_eq!(restored, session);
}

#[test]
fn selection_memory_idempotent_on_long_branchy_tree() {
    let mut session = ConversationSession::new();
    let mut parent = session.root_node_id.clone();
    for i in 0..50 {
        let pair = create_message_pair(&mut session, &format!("turn {i}"), &parent).unwrap();
        create_regenerate_branch(&mut session, &pair.assistant_id);
        parent = pair.assistant_id;
    }
    update_selection_memory(&mut session, &parent);
    let once = session.selection_memory.clone();
    update_selection_memory(&mut session, &parent);
    assert_eq!(session.selection_memory, once);
    assert_eq!(path_ids(&session).last(), Some(&parent));
}

// ── Modification timestamps ──────────────────────────────────────────────

/// Push `updated_at` into the past so any touch is observable.
fn backdate(session: &mut ConversationSession) -> DateTime<Utc> {
    session.updated_at = DateTime::<Utc>::MIN_UTC;
    session.updated_at
}

#[test]
fn every_mutator_advances_updated_at() {
    let mut s = ConversationSession::new();
    let root = s.root_node_id.clone();

    let stale = backdate(&mut s);
    let user = create_node(NodeConfig::new(Role::User, "q").parent(&root));
    let user_id = user.id.clone();
    assert!(add_node(&mut s, user));
    assert!(s.updated_at > stale, "add_node");

    let stale = backdate(&mut s);
    let reply = create_node(NodeConfig::new(Role::Assistant, "a").parent(&user_id));
    let reply_id = reply.id.clone();
    assert!(add_node(&mut s, reply));
    assert!(update_active_leaf(&mut s, &reply_id));
    assert!(s.updated_at > stale, "update_active_leaf");

    let stale = backdate(&mut s);
    assert!(edit_content(&mut s, &reply_id, "edited"));
    assert!(s.updated_at > stale, "edit_content");

    let stale = backdate(&mut s);
    assert!(set_status(&mut s, &reply_id, NodeStatus::Error));
    assert!(s.updated_at > stale, "set_status");

    let stale = backdate(&mut s);
    assert!(disable_subtree(&mut s, &user_id));
    assert!(s.updated_at > stale, "disable_subtree");

    let stale = backdate(&mut s);
    assert!(restore(&mut s, &user_id));
    assert!(s.updated_at > stale, "restore");

    let other = create_message_pair(&mut s, "other", &root).unwrap();
    let stale = backdate(&mut s);
    assert!(reparent(&mut s, &other.user_id, &reply_id));
    assert!(s.updated_at > stale, "reparent");

    let stale = backdate(&mut s);
    assert!(hard_delete(&mut s, &other.user_id));
    assert!(s.updated_at > stale, "hard_delete");
    assert!(validate_integrity(&s).is_empty());
}

#[test]
fn rejected_mutations_keep_updated_at() {
    let mut s = ConversationSession::new();
    let root = s.root_node_id.clone();
    let pair = create_message_pair(&mut s, "hello", &root).unwrap();
    let stale = backdate(&mut s);

    assert!(!hard_delete(&mut s, &root));
    assert!(!reparent(&mut s, &pair.user_id, &pair.assistant_id));
    assert!(!reparent(&mut s, &pair.user_id, &pair.user_id));
    assert!(!soft_delete(&mut s, &root));
    assert!(!edit_content(&mut s, "missing", "x"));
    assert!(!update_active_leaf(&mut s, "missing"));
    assert_eq!(s.updated_at, stale);
}
