//! Chat session types owned by the chat store.

use serde::{Deserialize, Serialize};

use crate::ids::ChatId;
use crate::memory::Role;

/// A named text file, either attached by the user or generated by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFile {
    pub name: String,
    pub content: String,
}

impl ChatFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One rendered message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<ChatFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: None,
            thinking: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: None,
            thinking: None,
        }
    }

    pub fn with_attachments(mut self, files: Vec<ChatFile>) -> Self {
        self.attachments = (!files.is_empty()).then_some(files);
        self
    }

    pub fn with_thinking(mut self, thinking: Option<String>) -> Self {
        self.thinking = thinking.filter(|text| !text.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ChatId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_files: Vec<ChatFile>,
}

impl ChatSession {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ChatId::default(),
            title: title.into(),
            messages: Vec::new(),
            generated_files: Vec::new(),
        }
    }
}

/// Merge `incoming` into `existing` by file name: a later file with the same
/// name replaces the earlier one in place, new names are appended.
pub fn merge_files(existing: &mut Vec<ChatFile>, incoming: impl IntoIterator<Item = ChatFile>) {
    for file in incoming {
        match existing.iter_mut().find(|current| current.name == file.name) {
            Some(slot) => *slot = file,
            None => existing.push(file),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_by_name_and_keeps_position() {
        let mut files = vec![ChatFile::new("a.txt", "1"), ChatFile::new("b.txt", "2")];
        merge_files(
            &mut files,
            [ChatFile::new("a.txt", "3"), ChatFile::new("c.txt", "4")],
        );

        assert_eq!(
            files,
            vec![
                ChatFile::new("a.txt", "3"),
                ChatFile::new("b.txt", "2"),
                ChatFile::new("c.txt", "4"),
            ]
        );
    }

    #[test]
    fn empty_attachment_list_is_omitted() {
        let message = ChatMessage::assistant("hi").with_attachments(Vec::new());
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("attachments").is_none());
        assert!(json.get("thinking").is_none());
    }

    #[test]
    fn session_serializes_generated_files_camel_case() {
        let mut session = ChatSession::new("t");
        session.generated_files.push(ChatFile::new("x", "y"));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["generatedFiles"][0]["name"], "x");
    }
}
