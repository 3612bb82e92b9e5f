//! Drekee session service.
//!
//! [`ClientBuilder`] wires the file-backed stores, the HTTP gateway and the
//! event hub into one [`DrekeeClient`], constructed once at process start and
//! shared by reference with the front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use drekee_chats::{DEFAULT_CHAT_TITLE, FileChatStore};
use drekee_events::EventStreamHub;
use drekee_gateway::{GatewayConfig, HttpModelGateway, ProviderStatus};
use drekee_memory::{FileMemoryPersistence, MemoryStore};
use drekee_protocol::{
    ChatId, ChatResult, ChatSession, ChatSessionPort, MemoryStats, ModelGateway, ModelMode,
    PipelineEvent,
};
use drekee_runtime::ChatAgent;
use tokio::fs;
use tracing::{info, instrument};

pub use drekee_events::StreamItem;
pub use drekee_runtime::{HistoryStats, RuntimeConfig, SendOutcome, SendRequest};

pub struct ClientBuilder {
    root: PathBuf,
    runtime_config: RuntimeConfig,
    mode: Option<ModelMode>,
    gateway_config: Option<GatewayConfig>,
    gateway: Option<Arc<dyn ModelGateway>>,
}

impl ClientBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runtime_config: RuntimeConfig::default(),
            mode: None,
            gateway_config: None,
            gateway: None,
        }
    }

    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Starting mode, overriding the runtime config default.
    pub fn mode(mut self, mode: ModelMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Endpoints for the built-in HTTP gateway. Defaults to the environment.
    pub fn gateway_config(mut self, config: GatewayConfig) -> Self {
        self.gateway_config = Some(config);
        self
    }

    /// Replace the HTTP gateway entirely.
    pub fn gateway(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn build(self) -> Result<DrekeeClient> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed creating data root {}", self.root.display()))?;

        let gateway_config = self.gateway_config.unwrap_or_else(GatewayConfig::from_env);
        let gateway: Arc<dyn ModelGateway> = match self.gateway {
            Some(gateway) => gateway,
            None => Arc::new(HttpModelGateway::new(gateway_config.clone())),
        };

        let persistence = Arc::new(FileMemoryPersistence::new(&self.root));
        let memory = MemoryStore::load(persistence).await;
        let chats: Arc<dyn ChatSessionPort> = Arc::new(FileChatStore::new(&self.root));
        let events = EventStreamHub::new(1024);

        let mut runtime_config = self.runtime_config;
        if let Some(mode) = self.mode {
            runtime_config.default_mode = mode;
        }
        let agent = ChatAgent::new(
            gateway,
            memory,
            chats.clone(),
            events.clone(),
            runtime_config,
        );

        let status = gateway_config.status();
        info!(
            groq = status.groq,
            mistral = status.mistral,
            mode = %agent.mode(),
            "drekee client ready"
        );

        Ok(DrekeeClient {
            root: self.root,
            agent: Arc::new(agent),
            chats,
            events,
            gateway_config,
        })
    }
}

#[derive(Clone)]
pub struct DrekeeClient {
    root: PathBuf,
    agent: Arc<ChatAgent>,
    chats: Arc<dyn ChatSessionPort>,
    events: EventStreamHub,
    gateway_config: GatewayConfig,
}

impl DrekeeClient {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new chat and make it current.
    #[instrument(skip(self))]
    pub async fn new_chat(&self, title: Option<String>) -> Result<ChatSession> {
        let title = title.unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_owned());
        self.chats
            .create_chat(title)
            .await
            .context("failed creating chat")
    }

    pub async fn current_chat(&self) -> Result<Option<ChatSession>> {
        self.chats
            .find_current_chat()
            .await
            .context("failed reading current chat")
    }

    pub async fn get_chat(&self, chat_id: &ChatId) -> Result<ChatSession> {
        self.chats
            .get_chat(chat_id)
            .await
            .with_context(|| format!("failed reading chat {chat_id}"))
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    pub async fn select_chat(&self, chat_id: &ChatId) -> Result<ChatSession> {
        self.chats
            .select_chat(chat_id)
            .await
            .with_context(|| format!("failed selecting chat {chat_id}"))
    }

    pub async fn list_chats(&self) -> Result<Vec<ChatSession>> {
        self.chats.list_chats().await.context("failed listing chats")
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    pub async fn delete_chat(&self, chat_id: &ChatId) -> Result<()> {
        self.chats
            .delete_chat(chat_id)
            .await
            .with_context(|| format!("failed deleting chat {chat_id}"))
    }

    /// Send a message through the pipeline. Errors stay typed so callers can
    /// tell a cancellation apart from a failure.
    pub async fn send(&self, request: SendRequest) -> ChatResult<SendOutcome> {
        self.agent.send(request).await
    }

    /// Cancel the send in flight, if any.
    pub fn stop(&self) -> bool {
        self.agent.stop_generation()
    }

    pub fn is_busy(&self) -> bool {
        self.agent.is_busy()
    }

    pub fn mode(&self) -> ModelMode {
        self.agent.mode()
    }

    pub fn set_mode(&self, mode: ModelMode) {
        self.agent.set_mode(mode);
    }

    pub fn memory(&self) -> &MemoryStore {
        self.agent.memory()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        self.agent.memory().stats()
    }

    pub async fn clear_memory(&self) -> Result<()> {
        self.agent
            .memory()
            .clear()
            .await
            .context("failed clearing memory")
    }

    /// Record explicit user feedback on a reply.
    pub async fn record_feedback(
        &self,
        message: &str,
        response: &str,
        feedback: &str,
    ) -> Result<()> {
        self.agent
            .memory()
            .learn_from_interaction(message, response, Some(feedback))
            .await
            .context("failed storing feedback")
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.agent.history_stats()
    }

    pub fn clear_history(&self) {
        self.agent.clear_history();
    }

    pub fn events(&self) -> &EventStreamHub {
        &self.events
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn provider_status(&self) -> ProviderStatus {
        self.gateway_config.status()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use drekee_protocol::{
        CallOptions, ChatError, GatewayError, ModelGateway, ModelMode, ModelTarget, PromptMessage,
    };
    use drekee_runtime::{RuntimeConfig, SendRequest};
    use tokio::fs;

    use crate::ClientBuilder;

    fn unique_test_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{name}-{nanos}"))
    }

    struct QueueGateway {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    }

    impl QueueGateway {
        fn new(replies: Vec<Result<String, GatewayError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ModelGateway for QueueGateway {
        async fn call(
            &self,
            _target: &ModelTarget,
            _messages: &[PromptMessage],
            _options: &CallOptions,
        ) -> Result<String, GatewayError> {
            self.replies
                .lock()
                .map_err(|_| GatewayError::Transport("poisoned".to_owned()))?
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[tokio::test]
    async fn chats_and_memory_survive_a_restart() -> Result<()> {
        let root = unique_test_root("drekee-kernel-restart");
        let client = ClientBuilder::new(&root)
            .runtime_config(RuntimeConfig::default().without_helpers())
            .mode(ModelMode::Fast)
            .gateway(QueueGateway::new(vec![Ok("Olá! 😊".to_owned())]))
            .build()
            .await?;

        let outcome = client.send(SendRequest::text("Oi, tudo bem?")).await?;
        assert_eq!(outcome.response, "Olá! 😊");
        assert_eq!(client.memory_stats().turn_count, 2);

        let reopened = ClientBuilder::new(&root)
            .gateway(QueueGateway::new(Vec::new()))
            .build()
            .await?;
        assert_eq!(reopened.memory_stats().turn_count, 2);
        let current = reopened
            .current_chat()
            .await?
            .ok_or_else(|| anyhow!("current chat lost"))?;
        assert_eq!(current.id, outcome.chat_id);
        assert_eq!(current.title, "Oi, tudo bem?");
        assert_eq!(current.messages.len(), 2);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn chat_management_round_trip() -> Result<()> {
        let root = unique_test_root("drekee-kernel-chats");
        let client = ClientBuilder::new(&root)
            .gateway(QueueGateway::new(Vec::new()))
            .build()
            .await?;

        let first = client.new_chat(None).await?;
        let second = client.new_chat(Some("Rust".to_owned())).await?;
        assert_eq!(first.title, "Nova conversa");

        let listed: Vec<_> = client
            .list_chats()
            .await?
            .into_iter()
            .map(|chat| chat.id)
            .collect();
        assert_eq!(listed, vec![second.id.clone(), first.id.clone()]);

        client.select_chat(&first.id).await?;
        client.delete_chat(&second.id).await?;
        assert_eq!(client.list_chats().await?.len(), 1);

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }

    #[tokio::test]
    async fn gateway_failures_surface_as_configuration_errors() -> Result<()> {
        let root = unique_test_root("drekee-kernel-failure");
        let client = ClientBuilder::new(&root)
            .runtime_config(RuntimeConfig::default().without_helpers())
            .gateway(QueueGateway::new(vec![Err(
                GatewayError::MissingCredentials {
                    provider: drekee_protocol::Provider::Groq,
                },
            )]))
            .build()
            .await?;

        let error = match client.send(SendRequest::text("oi")).await {
            Err(error) => error,
            Ok(outcome) => return Err(anyhow!("unexpected success: {outcome:?}")),
        };
        assert!(error.is_configuration());
        assert!(!matches!(error, ChatError::Aborted));
        assert!(error.user_message().contains("GROQ_API_KEY"));
        assert!(!client.is_busy());

        let _ = fs::remove_dir_all(root).await;
        Ok(())
    }
}
