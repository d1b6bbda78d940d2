//! Agent templates and their preset messages.
//!
//! A template is authored per agent and contributes to every context build.
//! Presets without an injection strategy form the *skeleton*; the rest are
//! spliced in relative to an anchor (`user_profile`, `chat_history`) or at a
//! depth counted back from the end of the conversation.

use crate::message::Role;
use serde::{Deserialize, Serialize};

/// Structural kind of a preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetKind {
    /// Ordinary text message
    #[default]
    Plain,
    /// Replaced by the user profile during assembly
    UserProfile,
    /// Replaced by the session history during assembly
    ChatHistory,
}

impl PresetKind {
    pub fn is_placeholder(self) -> bool {
        !matches!(self, PresetKind::Plain)
    }
}

/// Anchor landmark an injection is positioned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorTarget {
    UserProfile,
    ChatHistory,
}

impl AnchorTarget {
    /// Parse the wire name used in template files.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_profile" => Some(Self::UserProfile),
            "chat_history" => Some(Self::ChatHistory),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserProfile => "user_profile",
            Self::ChatHistory => "chat_history",
        }
    }
}

impl std::fmt::Display for AnchorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPosition {
    Before,
    After,
}

/// Injection strategy as authored in a template file.
///
/// Any combination of fields deserializes; the classifier turns this into a
/// typed placement and reports invalid combinations as assembly warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionStrategy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_position: Option<AnchorPosition>,
}

impl InjectionStrategy {
    pub fn depth(depth: i64) -> Self {
        Self {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn anchor(target: AnchorTarget, position: AnchorPosition) -> Self {
        Self {
            depth: None,
            anchor_target: Some(target.as_str().to_string()),
            anchor_position: Some(position),
        }
    }
}

/// A template-authored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetMessage {
    pub id: String,

    pub role: Role,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub kind: PresetKind,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection: Option<InjectionStrategy>,

    /// Higher first within an injection group
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

impl PresetMessage {
    /// Plain skeleton message.
    pub fn plain(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            kind: PresetKind::Plain,
            enabled: true,
            injection: None,
            priority: 0,
        }
    }

    /// Placeholder marking where the user profile goes.
    pub fn user_profile_placeholder(id: impl Into<String>) -> Self {
        Self {
            kind: PresetKind::UserProfile,
            ..Self::plain(id, Role::System, "")
        }
    }

    /// Placeholder marking where the session history goes.
    pub fn chat_history_placeholder(id: impl Into<String>) -> Self {
        Self {
            kind: PresetKind::ChatHistory,
            ..Self::plain(id, Role::User, "")
        }
    }

    pub fn with_injection(mut self, injection: InjectionStrategy) -> Self {
        self.injection = Some(injection);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// An agent's ordered template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub messages: Vec<PresetMessage>,
}

impl AgentTemplate {
    pub fn new(messages: Vec<PresetMessage>) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            messages,
        }
    }

    /// Enabled presets in template order, paired with their template index.
    pub fn enabled_messages(&self) -> impl Iterator<Item = (usize, &PresetMessage)> {
        self.messages.iter().enumerate().filter(|(_, m)| m.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_from_json() {
        let json = r#"{
            "id": "agent-1",
            "name": "Helper",
            "messages": [
                {"id": "sys", "role": "system", "content": "You are helpful."},
                {"id": "profile", "role": "system", "kind": "user_profile"},
                {"id": "hist", "role": "user", "kind": "chat_history"},
                {"id": "jb", "role": "system", "content": "Stay in character.",
                 "injection": {"depth": 2}, "priority": 5},
                {"id": "note", "role": "system", "content": "Note",
                 "injection": {"anchor_target": "chat_history", "anchor_position": "before"}},
                {"id": "off", "role": "system", "content": "unused", "enabled": false}
            ]
        }"#;
        let template: AgentTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.messages.len(), 6);
        assert_eq!(template.messages[1].kind, PresetKind::UserProfile);
        assert_eq!(template.messages[3].injection, Some(InjectionStrategy::depth(2)));
        assert_eq!(template.messages[3].priority, 5);
        assert_eq!(
            template.messages[4].injection,
            Some(InjectionStrategy::anchor(
                AnchorTarget::ChatHistory,
                AnchorPosition::Before
            ))
        );
        assert_eq!(template.enabled_messages().count(), 5);
    }

    #[test]
    fn anchor_target_parse() {
        assert_eq!(AnchorTarget::parse("user_profile"), Some(AnchorTarget::UserProfile));
        assert_eq!(AnchorTarget::parse("chat_history"), Some(AnchorTarget::ChatHistory));
        assert_eq!(AnchorTarget::parse("world_info"), None);
    }

    #[test]
    fn placeholders_are_placeholders() {
        assert!(PresetMessage::user_profile_placeholder("p").kind.is_placeholder());
        assert!(PresetMessage::chat_history_placeholder("h").kind.is_placeholder());
        assert!(!PresetMessage::plain("x", Role::System, "x").kind.is_placeholder());
    }
}
