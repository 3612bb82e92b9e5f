use async_trait::async_trait;
use drekee_protocol::{
    ChatError, ChatFile, ChatId, ChatMessage, ChatResult, ChatSession, ChatSessionPort,
};
use indexmap::IndexMap;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ChatState {
    /// Newest first.
    chats: IndexMap<ChatId, ChatSession>,
    current: Option<ChatId>,
}

impl ChatState {
    fn chat_mut(&mut self, chat_id: &ChatId) -> ChatResult<&mut ChatSession> {
        self.chats
            .get_mut(chat_id)
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))
    }
}

/// Process-local chat store.
#[derive(Debug, Default)]
pub struct InMemoryChatStore {
    state: Mutex<ChatState>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatSessionPort for InMemoryChatStore {
    async fn find_current_chat(&self) -> ChatResult<Option<ChatSession>> {
        let state = self.state.lock();
        Ok(state
            .current
            .as_ref()
            .and_then(|id| state.chats.get(id))
            .cloned())
    }

    async fn append_message(&self, chat_id: &ChatId, message: ChatMessage) -> ChatResult<()> {
        self.state.lock().chat_mut(chat_id)?.messages.push(message);
        Ok(())
    }

    async fn set_generated_files(
        &self,
        chat_id: &ChatId,
        files: Vec<ChatFile>,
    ) -> ChatResult<()> {
        self.state.lock().chat_mut(chat_id)?.generated_files = files;
        Ok(())
    }

    async fn generated_files(&self, chat_id: &ChatId) -> ChatResult<Vec<ChatFile>> {
        Ok(self.state.lock().chat_mut(chat_id)?.generated_files.clone())
    }

    async fn set_title(&self, chat_id: &ChatId, title: String) -> ChatResult<()> {
        self.state.lock().chat_mut(chat_id)?.title = title;
        Ok(())
    }

    async fn create_chat(&self, title: String) -> ChatResult<ChatSession> {
        let chat = ChatSession::new(title);
        let mut state = self.state.lock();
        state.chats.shift_insert(0, chat.id.clone(), chat.clone());
        state.current = Some(chat.id.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession> {
        Ok(self.state.lock().chat_mut(chat_id)?.clone())
    }

    async fn select_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession> {
        let mut state = self.state.lock();
        let chat = state.chat_mut(chat_id)?.clone();
        state.current = Some(chat_id.clone());
        Ok(chat)
    }

    async fn list_chats(&self) -> ChatResult<Vec<ChatSession>> {
        Ok(self.state.lock().chats.values().cloned().collect())
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> ChatResult<()> {
        let mut state = self.state.lock();
        if state.chats.shift_remove(chat_id).is_none() {
            return Err(ChatError::ChatNotFound(chat_id.to_string()));
        }
        if state.current.as_ref() == Some(chat_id) {
            state.current = state.chats.keys().next().cloned();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_chat_becomes_current_and_listed_first() -> anyhow::Result<()> {
        let store = InMemoryChatStore::new();
        let first = store.create_chat("primeira".to_owned()).await?;
        let second = store.create_chat("segunda".to_owned()).await?;

        let titles: Vec<String> = store
            .list_chats()
            .await?
            .into_iter()
            .map(|chat| chat.title)
            .collect();
        assert_eq!(titles, vec!["segunda", "primeira"]);
        assert_eq!(
            store.find_current_chat().await?.map(|chat| chat.id),
            Some(second.id)
        );

        store.select_chat(&first.id).await?;
        assert_eq!(
            store.find_current_chat().await?.map(|chat| chat.id),
            Some(first.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn messages_and_files_are_stored_per_chat() -> anyhow::Result<()> {
        let store = InMemoryChatStore::new();
        let chat = store.create_chat("t".to_owned()).await?;

        store
            .append_message(&chat.id, ChatMessage::user("oi"))
            .await?;
        store
            .set_generated_files(&chat.id, vec![ChatFile::new("a.txt", "hi")])
            .await?;

        let stored = store.get_chat(&chat.id).await?;
        assert_eq!(stored.messages.len(), 1);
        assert_eq!(store.generated_files(&chat.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_current_chat_moves_current_to_next() -> anyhow::Result<()> {
        let store = InMemoryChatStore::new();
        let older = store.create_chat("old".to_owned()).await?;
        let newer = store.create_chat("new".to_owned()).await?;

        store.delete_chat(&newer.id).await?;
        assert_eq!(
            store.find_current_chat().await?.map(|chat| chat.id),
            Some(older.id)
        );

        let missing = store.delete_chat(&newer.id).await;
        assert!(matches!(missing, Err(ChatError::ChatNotFound(_))));
        Ok(())
    }
}
