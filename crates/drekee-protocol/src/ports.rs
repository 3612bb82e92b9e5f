//! Boundary ports between the chat core and its collaborators.
//!
//! These traits are the only allowed runtime boundary between the pipeline
//! and external implementations (model providers, the memory slot, and the
//! chat session store).
//!
//! Object-safety note: traits use `async-trait` for async dyn-dispatch.

use async_trait::async_trait;

use crate::chat::{ChatFile, ChatMessage, ChatSession};
use crate::error::{ChatResult, GatewayError};
use crate::ids::ChatId;
use crate::memory::MemorySnapshot;
use crate::model::{CallOptions, ModelTarget, PromptMessage};

/// Issues one model call and returns the raw response text.
///
/// Any non-success status is a hard failure of that call; implementations
/// do not retry.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn call(
        &self,
        target: &ModelTarget,
        messages: &[PromptMessage],
        options: &CallOptions,
    ) -> Result<String, GatewayError>;
}

/// Durable key-value slot holding the memory snapshot.
///
/// `load` reports malformed stored data as `Ok(None)`, exactly like an empty
/// slot. Errors are reserved for backends that cannot be read or written.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn load(&self) -> ChatResult<Option<MemorySnapshot>>;
    async fn save(&self, snapshot: &MemorySnapshot) -> ChatResult<()>;
    async fn clear(&self) -> ChatResult<()>;
}

/// Read/write access to the chat sessions owned by the session layer.
#[async_trait]
pub trait ChatSessionPort: Send + Sync {
    async fn find_current_chat(&self) -> ChatResult<Option<ChatSession>>;
    async fn append_message(&self, chat_id: &ChatId, message: ChatMessage) -> ChatResult<()>;
    async fn set_generated_files(&self, chat_id: &ChatId, files: Vec<ChatFile>)
    -> ChatResult<()>;
    async fn generated_files(&self, chat_id: &ChatId) -> ChatResult<Vec<ChatFile>>;
    async fn set_title(&self, chat_id: &ChatId, title: String) -> ChatResult<()>;
    /// Create a chat and make it current.
    async fn create_chat(&self, title: String) -> ChatResult<ChatSession>;
    async fn get_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession>;
    /// Make `chat_id` the current chat.
    async fn select_chat(&self, chat_id: &ChatId) -> ChatResult<ChatSession>;
    /// All chats, newest first.
    async fn list_chats(&self) -> ChatResult<Vec<ChatSession>>;
    async fn delete_chat(&self, chat_id: &ChatId) -> ChatResult<()>;
}
