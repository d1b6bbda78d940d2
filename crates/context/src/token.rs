//! Rough token accounting for limiter thresholds and assembly metadata.
//!
//! One token per four characters, rounded up, plus a fixed cost per message.
//! The model client owns exact counts.

use branchloom_core::message::AssembledMessage;

/// Fixed per-message cost for the role tag and delimiters.
pub const MESSAGE_OVERHEAD: usize = 4;

const CHARS_PER_TOKEN: usize = 4;

/// Estimated tokens for a piece of text. Counts characters, not bytes.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

pub fn estimate_message_tokens(message: &AssembledMessage) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Sum over a message list, overhead included.
pub fn estimate_messages_tokens(messages: &[AssembledMessage]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchloom_core::message::{Provenance, Role, SourceType};

    fn msg(role: Role, content: &str) -> AssembledMessage {
        AssembledMessage::new(
            role,
            content,
            Provenance {
                source_type: SourceType::History,
                source_id: "n".into(),
                source_index: 0,
            },
        )
    }

    #[test]
    fn rounds_up_per_four_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        assert_eq!(estimate_message_tokens(&msg(Role::User, "test")), 5);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        assert_eq!(estimate_tokens("héllo wörld"), 3);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![msg(Role::User, "hello"), msg(Role::Assistant, "world")];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }
}
