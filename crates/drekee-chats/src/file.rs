use std::path::{Path, PathBuf};

use async_trait::async_trait;
use drekee_protocol::{
    ChatError, ChatFile, ChatId, ChatMessage, ChatResult, ChatSession, ChatSessionPort,
};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

const CHATS_DIR: &str = "chats";
const INDEX_FILE: &str = "index.json";

/// Display order (newest first) and the current chat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatIndex {
    #[serde(default)]
    current: Option<ChatId>,
    #[serde(default)]
    order: Vec<ChatId>,
}

/// Chat store keeping `chats/<id>.json` per chat plus `chats/index.json`
/// under a data root.
///
/// Writes are serialized through one lock so read-modify-write cycles on a
/// chat never interleave.
#[derive(Debug)]
pub struct FileChatStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileChatStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join(CHATS_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn chat_path(&self, chat_id: &ChatId) -> ChatResult<PathBuf> {
        let raw = chat_id.as_str();
        let safe = !raw.is_empty()
            && raw
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !safe {
            return Err(ChatError::ChatNotFound(raw.to_owned()));
        }
        Ok(self.dir.join(format!("{raw}.json")))
    }

    async fn ensure_dir(&self) -> ChatResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|error| io_error("creating chats dir", &self.dir, error))
    }

    async fn read_index(&self) -> ChatResult<ChatIndex> {
        let path = self.index_path();
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(ChatIndex::default());
        }
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|error| io_error("reading chat index", &path, error))?;
        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(error) => {
                warn!(path = %path.display(), %error, "chat index unreadable, starting fresh");
                Ok(ChatIndex::default())
            }
        }
    }

    async fn write_index(&self, index: &ChatIndex) -> ChatResult<()> {
        self.ensure_dir().await?;
        let path = self.index_path();
        let payload = serde_json::to_string_pretty(index)?;
        fs::write(&path, payload)
            .await
            .map_err(|error| io_error("writing chat index", &path, error))
    }

    async fn read_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession> {
        let path = self.chat_path(chat_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ChatError::ChatNotFound(chat_id.to_string()));
        }
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|error| io_error("reading chat", &path, error))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn write_chat(&self, chat: &ChatSession) -> ChatResult<()> {
        self.ensure_dir().await?;
        let path = self.chat_path(&chat.id)?;
        let payload = serde_json::to_string_pretty(chat)?;
        fs::write(&path, payload)
            .await
            .map_err(|error| io_error("writing chat", &path, error))
    }

    async fn update_chat<F>(&self, chat_id: &ChatId, update: F) -> ChatResult<()>
    where
        F: FnOnce(&mut ChatSession) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut chat = self.read_chat(chat_id).await?;
        update(&mut chat);
        self.write_chat(&chat).await
    }
}

fn io_error(action: &str, path: &Path, error: std::io::Error) -> ChatError {
    ChatError::Persistence(format!("failed {action} {}: {error}", path.display()))
}

#[async_trait]
impl ChatSessionPort for FileChatStore {
    async fn find_current_chat(&self) -> ChatResult<Option<ChatSession>> {
        let index = self.read_index().await?;
        let Some(current) = index.current else {
            return Ok(None);
        };
        match self.read_chat(&current).await {
            Ok(chat) => Ok(Some(chat)),
            Err(ChatError::ChatNotFound(id)) => {
                warn!(chat_id = %id, "current chat is missing on disk");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    #[instrument(skip_all, fields(chat_id = %chat_id, role = %message.role))]
    async fn append_message(&self, chat_id: &ChatId, message: ChatMessage) -> ChatResult<()> {
        self.update_chat(chat_id, |chat| chat.messages.push(message))
            .await
    }

    async fn set_generated_files(
        &self,
        chat_id: &ChatId,
        files: Vec<ChatFile>,
    ) -> ChatResult<()> {
        self.update_chat(chat_id, |chat| chat.generated_files = files)
            .await
    }

    async fn generated_files(&self, chat_id: &ChatId) -> ChatResult<Vec<ChatFile>> {
        Ok(self.read_chat(chat_id).await?.generated_files)
    }

    async fn set_title(&self, chat_id: &ChatId, title: String) -> ChatResult<()> {
        self.update_chat(chat_id, |chat| chat.title = title).await
    }

    #[instrument(skip(self))]
    async fn create_chat(&self, title: String) -> ChatResult<ChatSession> {
        let _guard = self.write_lock.lock().await;
        let chat = ChatSession::new(title);
        self.write_chat(&chat).await?;

        let mut index = self.read_index().await?;
        index.order.insert(0, chat.id.clone());
        index.current = Some(chat.id.clone());
        self.write_index(&index).await?;

        debug!(chat_id = %chat.id, "chat created");
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession> {
        self.read_chat(chat_id).await
    }

    async fn select_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession> {
        let _guard = self.write_lock.lock().await;
        let chat = self.read_chat(chat_id).await?;
        let mut index = self.read_index().await?;
        index.current = Some(chat.id.clone());
        self.write_index(&index).await?;
        Ok(chat)
    }

    async fn list_chats(&self) -> ChatResult<Vec<ChatSession>> {
        let index = self.read_index().await?;
        let mut chats = Vec::with_capacity(index.order.len());
        for chat_id in &index.order {
            match self.read_chat(chat_id).await {
                Ok(chat) => chats.push(chat),
                Err(error) => warn!(chat_id = %chat_id, %error, "skipping unreadable chat"),
            }
        }
        Ok(chats)
    }

    #[instrument(skip_all, fields(chat_id = %chat_id))]
    async fn delete_chat(&self, chat_id: &ChatId) -> ChatResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.chat_path(chat_id)?;
        let mut index = self.read_index().await?;
        let known = index.order.contains(chat_id);
        let on_disk = fs::try_exists(&path).await.unwrap_or(false);
        if !known && !on_disk {
            return Err(ChatError::ChatNotFound(chat_id.to_string()));
        }

        if on_disk {
            fs::remove_file(&path)
                .await
                .map_err(|error| io_error("removing chat", &path, error))?;
        }
        index.order.retain(|id| id != chat_id);
        if index.current.as_ref() == Some(chat_id) {
            index.current = index.order.first().cloned();
        }
        self.write_index(&index).await
    }
}
