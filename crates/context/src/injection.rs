//! Injection engine: splices anchor and depth injections into an assembled
//! list.
//!
//! Anchor injections must be applied before depth injections on the same
//! list, since depth is counted against the anchor-expanded length.

use crate::classifier::{ClassifiedPreset, DepthInjection, InjectionGroup};
use branchloom_core::message::{AssembledMessage, Provenance, SourceType};
use serde::{Deserialize, Serialize};

/// Position of an anchor landmark inside a list.
///
/// The profile block always spans one message; the history block spans the
/// whole history and may be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSpan {
    pub index: usize,
    pub len: usize,
}

impl AnchorSpan {
    pub fn new(index: usize, len: usize) -> Self {
        Self { index, len }
    }
}

fn to_message(entry: &ClassifiedPreset, source_type: SourceType) -> AssembledMessage {
    AssembledMessage::new(
        entry.preset.role,
        entry.preset.content.clone(),
        Provenance {
            source_type,
            source_id: entry.preset.id.clone(),
            source_index: entry.template_index,
        },
    )
}

/// Insert `group.before` immediately before the anchor and `group.after`
/// immediately after it. Returns the anchor's shifted span.
pub fn apply_anchor_injections(
    target: AnchorSpan,
    list: &mut Vec<AssembledMessage>,
    group: &InjectionGroup,
) -> AnchorSpan {
    let index = target.index.min(list.len());
    let len = target.len.min(list.len() - index);

    let before: Vec<_> = group
        .before
        .iter()
        .map(|e| to_message(e, SourceType::AnchorInjection))
        .collect();
    let shifted = index + before.len();
    list.splice(index..index, before);

    let after_at = shifted + len;
    let after = group
        .after
        .iter()
        .map(|e| to_message(e, SourceType::AnchorInjection));
    list.splice(after_at..after_at, after);

    AnchorSpan::new(shifted, len)
}

/// Insert each depth injection so that exactly `depth` messages of the
/// incoming list follow it (depth 0 appends; depths beyond the list length
/// prepend).
///
/// Injections that share an insertion point keep their classifier order.
/// Returns the insertion points, as indices into the incoming list.
pub fn apply_depth_injections(
    list: &mut Vec<AssembledMessage>,
    injections: &[DepthInjection],
) -> Vec<usize> {
    if injections.is_empty() {
        return Vec::new();
    }
    let original_len = list.len();
    let mut points = Vec::with_capacity(injections.len());
    let mut at_point: Vec<Vec<&DepthInjection>> = vec![Vec::new(); original_len + 1];
    for injection in injections {
        let point = original_len.saturating_sub(injection.depth);
        points.push(point);
        at_point[point].push(injection);
    }

    let original = std::mem::take(list);
    list.reserve(original_len + injections.len());
    let mut originals = original.into_iter();
    for pending in at_point {
        list.extend(
            pending
                .into_iter()
                .map(|d| to_message(&d.entry, SourceType::DepthInjection)),
        );
        if let Some(message) = originals.next() {
            list.push(message);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_core::message::Role;
    use branchloom_core::preset::PresetMessage;

    fn msg(id: &str) -> AssembledMessage {
        AssembledMessage::new(
            Role::System,
            id,
            Provenance {
                source_type: SourceType::Preset,
                source_id: id.into(),
                source_index: 0,
            },
        )
    }

    fn preset(id: &str, index: usize) -> ClassifiedPreset {
        ClassifiedPreset {
            template_index: index,
            preset: PresetMessage::plain(id, Role::System, id),
        }
    }

    fn depth(id: &str, depth: usize) -> DepthInjection {
        DepthInjection {
            depth,
            entry: preset(id, 0),
        }
    }

    fn contents(list: &[AssembledMessage]) -> Vec<&str> {
        list.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn profile_anchor_before_and_after() {
        let mut list = vec![msg("A"), msg("user_profile"), msg("B")];
        let group = InjectionGroup {
            before: vec![preset("before", 3)],
            after: vec![preset("after", 4)],
        };
        let span = apply_anchor_injections(AnchorSpan::new(1, 1), &mut list, &group);
        assert_eq!(contents(&list), vec!["A", "before", "user_profile", "after", "B"]);
        assert_eq!(span, AnchorSpan::new(2, 1));
        assert_eq!(list[1].provenance.source_type, SourceType::AnchorInjection);
        assert_eq!(list[1].provenance.source_index, 3);
    }

    #[test]
    fn anchor_span_covers_block() {
        let mut list = vec![msg("sk"), msg("h1"), msg("h2"), msg("h3")];
        let group = InjectionGroup {
            before: vec![preset("b1", 0), preset("b2", 1)],
            after: vec![preset("a1", 2)],
        };
        let span = apply_anchor_injections(AnchorSpan::new(1, 3), &mut list, &group);
        assert_eq!(contents(&list), vec!["sk", "b1", "b2", "h1", "h2", "h3", "a1"]);
        assert_eq!(span, AnchorSpan::new(3, 3));
    }

    #[test]
    fn empty_span_keeps_before_ahead_of_after() {
        let mut list = vec![msg("x")];
        let group = InjectionGroup {
            before: vec![preset("b", 0)],
            after: vec![preset("a", 1)],
        };
        apply_anchor_injections(AnchorSpan::new(1, 0), &mut list, &group);
        assert_eq!(contents(&list), vec!["x", "b", "a"]);
    }

    #[test]
    fn depth_two_in_five_lands_at_index_three() {
        let mut list: Vec<_> = ["m0", "m1", "m2", "m3", "m4"].iter().map(|s| msg(s)).collect();
        apply_depth_injections(&mut list, &[depth("inj", 2)]);
        assert_eq!(list.len(), 6);
        assert_eq!(list[3].content, "inj");
        assert_eq!(contents(&list[4..]), vec!["m3", "m4"]);
        assert_eq!(list[3].provenance.source_type, SourceType::DepthInjection);
    }

    #[test]
    fn depth_zero_appends_and_large_depth_prepends() {
        let mut list = vec![msg("m0"), msg("m1")];
        let points = apply_depth_injections(&mut list, &[depth("end", 0), depth("start", 10)]);
        assert_eq!(contents(&list), vec!["start", "m0", "m1", "end"]);
        assert_eq!(points, vec![2, 0]);
    }

    #[test]
    fn same_depth_keeps_classifier_order() {
        let mut list = vec![msg("m0"), msg("m1"), msg("m2")];
        apply_depth_injections(&mut list, &[depth("first", 1), depth("second", 1)]);
        assert_eq!(contents(&list), vec!["m0", "m1", "first", "second", "m2"]);
    }

    #[test]
    fn depth_into_empty_list() {
        let mut list = Vec::new();
        apply_depth_injections(&mut list, &[depth("a", 0), depth("b", 3)]);
        assert_eq!(contents(&list), vec!["a", "b"]);
    }
}
