//! Preset classification.
//!
//! Splits an agent template into the skeleton (kept in template order,
//! placeholders included), depth injections, and anchor injections grouped
//! per landmark. Malformed strategies are dropped with a warning.

use branchloom_core::preset::{AgentTemplate, AnchorPosition, AnchorTarget, PresetMessage};
use std::cmp::Reverse;
use tracing::warn;

/// A preset paired with its index in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedPreset {
    pub template_index: usize,
    pub preset: PresetMessage,
}

/// A preset positioned `depth` messages back from the end of the
/// conversation list.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthInjection {
    pub depth: usize,
    pub entry: ClassifiedPreset,
}

/// Presets placed around one anchor. Each side is ordered by priority
/// (descending), then template order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionGroup {
    pub before: Vec<ClassifiedPreset>,
    pub after: Vec<ClassifiedPreset>,
}

impl InjectionGroup {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    fn push(&mut self, position: AnchorPosition, entry: ClassifiedPreset) {
        match position {
            AnchorPosition::Before => self.before.push(entry),
            AnchorPosition::After => self.after.push(entry),
        }
    }

    fn sort(&mut self) {
        sort_by_priority(&mut self.before, |e| e);
        sort_by_priority(&mut self.after, |e| e);
    }
}

/// Anchor injections for every landmark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorInjections {
    pub user_profile: InjectionGroup,
    pub chat_history: InjectionGroup,
}

impl AnchorInjections {
    pub fn group(&self, target: AnchorTarget) -> &InjectionGroup {
        match target {
            AnchorTarget::UserProfile => &self.user_profile,
            AnchorTarget::ChatHistory => &self.chat_history,
        }
    }

    pub fn group_mut(&mut self, target: AnchorTarget) -> &mut InjectionGroup {
        match target {
            AnchorTarget::UserProfile => &mut self.user_profile,
            AnchorTarget::ChatHistory => &mut self.chat_history,
        }
    }
}

/// Result of classifying a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedPresets {
    pub skeleton: Vec<ClassifiedPreset>,
    pub depth_injections: Vec<DepthInjection>,
    pub anchor_injections: AnchorInjections,
    /// Malformed strategies that were dropped or ignored
    pub warnings: Vec<String>,
}

enum Placement {
    Skeleton,
    Depth(usize),
    Anchor(AnchorTarget, AnchorPosition),
}

/// Classify the template's enabled presets.
pub fn classify(template: &AgentTemplate) -> ClassifiedPresets {
    let mut out = ClassifiedPresets::default();

    for (template_index, preset) in template.enabled_messages() {
        let entry = ClassifiedPreset {
            template_index,
            preset: preset.clone(),
        };
        match placement(preset) {
            Ok(Placement::Skeleton) => out.skeleton.push(entry),
            Ok(Placement::Depth(depth)) => out.depth_injections.push(DepthInjection { depth, entry }),
            Ok(Placement::Anchor(target, position)) => {
                out.anchor_injections.group_mut(target).push(position, entry)
            }
            Err(reason) => {
                warn!(preset_id = %preset.id, reason = %reason, "Malformed injection strategy");
                let message = format!("preset '{}': {reason}", preset.id);
                if preset.kind.is_placeholder() {
                    // Placeholders keep their structural role.
                    out.skeleton.push(entry);
                    out.warnings.push(format!("{message}; strategy ignored"));
                } else {
                    out.warnings.push(format!("{message}; preset dropped"));
                }
            }
        }
    }

    sort_by_priority(&mut out.depth_injections, |d| &d.entry);
    out.anchor_injections.user_profile.sort();
    out.anchor_injections.chat_history.sort();
    out
}

fn placement(preset: &PresetMessage) -> Result<Placement, String> {
    let Some(strategy) = &preset.injection else {
        return Ok(Placement::Skeleton);
    };
    if preset.kind.is_placeholder() {
        return Err("placeholders cannot be injected".into());
    }

    match (strategy.depth, strategy.anchor_target.as_deref()) {
        (Some(_), Some(_)) => Err("both depth and anchor_target are set".into()),
        (Some(depth), None) => usize::try_from(depth)
            .map(Placement::Depth)
            .map_err(|_| format!("negative depth {depth}")),
        (None, Some(target)) => {
            let target = AnchorTarget::parse(target)
                .ok_or_else(|| format!("unknown anchor target '{target}'"))?;
            let position = strategy
                .anchor_position
                .ok_or_else(|| "anchor_position is missing".to_string())?;
            Ok(Placement::Anchor(target, position))
        }
        // An empty strategy object means no injection.
        (None, None) if strategy.anchor_position.is_none() => Ok(Placement::Skeleton),
        (None, None) => Err("anchor_position without anchor_target".into()),
    }
}

/// Stable sort: priority descending, then template order.
fn sort_by_priority<T>(items: &mut [T], entry: impl Fn(&T) -> &ClassifiedPreset) {
    items.sort_by_key(|item| {
        let e = entry(item);
        (Reverse(e.preset.priority), e.template_index)
    });
}
