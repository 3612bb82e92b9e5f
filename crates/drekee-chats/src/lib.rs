//! Chat session stores implementing [`ChatSessionPort`].
//!
//! [`FileChatStore`] keeps one JSON document per chat plus an index holding
//! the display order and the current chat. [`InMemoryChatStore`] has the same
//! semantics without touching disk.

pub mod file;
pub mod memory;

pub use drekee_protocol::ChatSessionPort;
pub use file::FileChatStore;
pub use memory::InMemoryChatStore;

pub const DEFAULT_CHAT_TITLE: &str = "Nova conversa";
pub const TITLE_MAX_CHARS: usize = 50;

/// Title derived from the first message of a chat: its first
/// [`TITLE_MAX_CHARS`] characters, with `...` when cut.
pub fn title_from_message(message: &str) -> String {
    match message.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_become_the_title_verbatim() {
        assert_eq!(title_from_message("Olá"), "Olá");
        let exact = "x".repeat(TITLE_MAX_CHARS);
        assert_eq!(title_from_message(&exact), exact);
    }

    #[test]
    fn long_messages_are_cut_at_fifty_chars() {
        let title = title_from_message(&"ç".repeat(80));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }
}
