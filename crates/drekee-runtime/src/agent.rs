//! The per-instance chat pipeline: attachment intake, memory, history,
//! orchestration and the bookkeeping that follows a reply.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use drekee_chats::{DEFAULT_CHAT_TITLE, title_from_message};
use drekee_events::EventStreamHub;
use drekee_memory::MemoryStore;
use drekee_protocol::{
    AgentPhase, ChatError, ChatFile, ChatId, ChatMessage, ChatResult, ChatSession,
    ChatSessionPort, ModelGateway, ModelMode, PipelineEvent, PipelineStage, PromptMessage,
    RequestId, Role,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RuntimeConfig;
use crate::helpers::{
    default_thinking_steps, follow_ups_prompt, parse_follow_ups, parse_thinking_steps,
    thinking_checks_prompt,
};
use crate::history::{ConversationHistory, HistoryStats};
use crate::orchestrator::{ResponseOrchestrator, Strategy, TurnContext};

/// Shown in place of a blank model reply.
pub const EMPTY_RESPONSE_NOTICE: &str =
    "Desculpe, não consegui gerar uma resposta. Tente reformular sua pergunta.";
/// Logged to memory in place of a blank model reply.
pub const EMPTY_RESPONSE_MARKER: &str = "[resposta vazia]";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<ChatFile>,
}

impl SendRequest {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<ChatFile>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub request_id: RequestId,
    pub chat_id: ChatId,
    pub mode: ModelMode,
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ChatFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<String>,
}

/// First `max` attachments, rejected as a whole if any of them is blank.
pub fn take_attachments(attachments: Vec<ChatFile>, max: usize) -> ChatResult<Vec<ChatFile>> {
    let taken: Vec<ChatFile> = attachments.into_iter().take(max).collect();
    let empty: Vec<String> = taken
        .iter()
        .filter(|file| file.content.trim().is_empty())
        .map(|file| file.name.clone())
        .collect();
    if !empty.is_empty() {
        return Err(ChatError::EmptyAttachments(empty));
    }
    Ok(taken)
}

/// One conversational agent. At most one send runs at a time; a second
/// concurrent send fails with [`ChatError::Busy`].
pub struct ChatAgent {
    orchestrator: ResponseOrchestrator,
    gateway: Arc<dyn ModelGateway>,
    memory: MemoryStore,
    chats: Arc<dyn ChatSessionPort>,
    events: EventStreamHub,
    config: RuntimeConfig,
    mode: Mutex<ModelMode>,
    history: Mutex<ConversationHistory>,
    busy: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Clears the busy flag and the cancellation slot when a send ends.
struct SendGuard<'a> {
    agent: &'a ChatAgent,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.agent.cancel.lock().take();
        self.agent.busy.store(false, Ordering::Release);
    }
}

impl ChatAgent {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        memory: MemoryStore,
        chats: Arc<dyn ChatSessionPort>,
        events: EventStreamHub,
        config: RuntimeConfig,
    ) -> Self {
        let orchestrator = ResponseOrchestrator::new(
            gateway.clone(),
            chats.clone(),
            events.clone(),
            config.clone(),
        );
        Self {
            orchestrator,
            gateway,
            memory,
            chats,
            events,
            mode: Mutex::new(config.default_mode),
            history: Mutex::new(ConversationHistory::new(config.history_limit)),
            config,
            busy: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> ModelMode {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: ModelMode) {
        *self.mode.lock() = mode;
        debug!(%mode, "model mode changed");
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Cancel the send in flight. Returns false when nothing was running.
    pub fn stop_generation(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn history_stats(&self) -> HistoryStats {
        self.history.lock().stats()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn events(&self) -> &EventStreamHub {
        &self.events
    }

    #[instrument(
        skip_all,
        fields(
            chars = request.message.chars().count(),
            attachments = request.attachments.len()
        )
    )]
    pub async fn send(&self, request: SendRequest) -> ChatResult<SendOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::Busy);
        }
        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());
        let _guard = SendGuard { agent: self };

        let attachments = take_attachments(request.attachments, self.config.max_attachments)?;
        let request_id = RequestId::default();

        match self
            .run_pipeline(&request_id, request.message, attachments, &cancel)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(ChatError::Aborted) => {
                info!(request_id = %request_id, "send aborted");
                self.set_phase(&request_id, AgentPhase::Aborted);
                self.events.publish(PipelineEvent::Aborted { request_id });
                Err(ChatError::Aborted)
            }
            Err(error) => {
                warn!(request_id = %request_id, %error, "send failed");
                self.events.publish(PipelineEvent::Failed {
                    request_id: request_id.clone(),
                    message: error.user_message(),
                    configuration: error.is_configuration(),
                });
                self.set_phase(&request_id, AgentPhase::Idle);
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request_id: &RequestId,
        message: String,
        attachments: Vec<ChatFile>,
        cancel: &CancellationToken,
    ) -> ChatResult<SendOutcome> {
        let mode = self.mode();
        let chat = self.ensure_chat().await?;
        self.events.publish(PipelineEvent::SendStarted {
            request_id: request_id.clone(),
            chat_id: Some(chat.id.clone()),
            mode,
        });

        self.chats
            .append_message(
                &chat.id,
                ChatMessage::user(message.clone()).with_attachments(attachments.clone()),
            )
            .await?;
        if let Err(error) = self.memory.add_turn(Role::User, &message).await {
            warn!(%error, "failed to persist user turn");
        }
        let memory = self.memory.relevant_context(&message);

        let files = if attachments.is_empty() {
            self.chats
                .generated_files(&chat.id)
                .await?
                .into_iter()
                .take(self.config.max_reused_files)
                .collect()
        } else {
            attachments.clone()
        };

        let prior = {
            let mut history = self.history.lock();
            let prior = history.messages();
            history.push(PromptMessage::user(message.clone()));
            prior
        };

        self.set_phase(request_id, AgentPhase::Sending);
        let strategy = Strategy::select(mode, !attachments.is_empty());
        let turn = TurnContext {
            request_id,
            chat_id: &chat.id,
            user_message: &message,
            memory: &memory,
            files: &files,
            history: &prior,
        };
        debug!(
            ?strategy,
            memory = memory.len(),
            files = files.len(),
            history = prior.len(),
            "prompt inputs ready"
        );

        let thinking_steps = if self.config.thinking_checks && strategy != Strategy::Fast {
            self.thinking_checks(&turn, cancel).await?
        } else {
            Vec::new()
        };

        let orchestrated = self.orchestrator.run(strategy, turn, cancel).await?;

        self.set_phase(request_id, AgentPhase::Rendering);
        let (response, memory_text) = if orchestrated.response.trim().is_empty() {
            warn!(request_id = %request_id, "model returned a blank reply");
            (
                EMPTY_RESPONSE_NOTICE.to_owned(),
                EMPTY_RESPONSE_MARKER.to_owned(),
            )
        } else {
            (orchestrated.response.clone(), orchestrated.response)
        };

        if self.chats.get_chat(&chat.id).await?.messages.len() == 1 {
            self.chats
                .set_title(&chat.id, title_from_message(&message))
                .await?;
        }
        self.chats
            .append_message(
                &chat.id,
                ChatMessage::assistant(response.clone())
                    .with_attachments(orchestrated.attachments.clone())
                    .with_thinking(orchestrated.reasoning.clone()),
            )
            .await?;
        self.history
            .lock()
            .push(PromptMessage::assistant(response.clone()));

        if let Err(error) = self.memory.add_turn(Role::Assistant, &memory_text).await {
            warn!(%error, "failed to persist assistant turn");
        }
        if let Err(error) = self
            .memory
            .learn_from_interaction(&message, &memory_text, None)
            .await
        {
            warn!(%error, "failed to persist learned preferences");
        }

        self.events.publish(PipelineEvent::ResponseReady {
            request_id: request_id.clone(),
            response: response.clone(),
            reasoning: orchestrated.reasoning.clone(),
            attachments: orchestrated.attachments.clone(),
        });

        let follow_ups = if self.config.follow_ups {
            self.follow_ups(request_id, &message, &response, cancel)
                .await
        } else {
            Vec::new()
        };

        self.set_phase(request_id, AgentPhase::Idle);
        info!(
            request_id = %request_id,
            chat_id = %chat.id,
            %mode,
            chars = response.chars().count(),
            files = orchestrated.attachments.len(),
            "send completed"
        );

        Ok(SendOutcome {
            request_id: request_id.clone(),
            chat_id: chat.id,
            mode,
            response,
            reasoning: orchestrated.reasoning,
            attachments: orchestrated.attachments,
            thinking_steps,
            follow_ups,
        })
    }

    async fn ensure_chat(&self) -> ChatResult<ChatSession> {
        match self.chats.find_current_chat().await? {
            Some(chat) => Ok(chat),
            None => {
                debug!("no current chat, creating one");
                self.chats.create_chat(DEFAULT_CHAT_TITLE.to_owned()).await
            }
        }
    }

    /// Step labels from the helper model. Only cancellation escapes; any
    /// other failure falls back to the default steps.
    async fn thinking_checks(
        &self,
        turn: &TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> ChatResult<Vec<String>> {
        let messages = thinking_checks_prompt(turn.user_message);
        let steps = match self
            .orchestrator
            .call_stage(
                turn,
                PipelineStage::ThinkingChecks,
                &self.config.models.helper,
                &messages,
                cancel,
            )
            .await
        {
            Ok(reply) => parse_thinking_steps(&reply),
            Err(ChatError::Aborted) => return Err(ChatError::Aborted),
            Err(error) => {
                warn!(%error, "thinking checks failed, using default steps");
                default_thinking_steps()
            }
        };

        for (index, text) in steps.iter().enumerate() {
            self.events.publish(PipelineEvent::ThinkingStep {
                request_id: turn.request_id.clone(),
                index,
                text: text.clone(),
            });
        }
        Ok(steps)
    }

    async fn follow_ups(
        &self,
        request_id: &RequestId,
        message: &str,
        response: &str,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let target = &self.config.models.helper;
        let options = self.config.options_for(target);
        let messages = follow_ups_prompt(message, response);

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Vec::new(),
            reply = self.gateway.call(target, &messages, &options) => reply,
        };
        let suggestions = match reply {
            Ok(reply) => parse_follow_ups(&reply),
            Err(error) => {
                warn!(%error, "follow-up suggestions failed");
                return Vec::new();
            }
        };

        if !suggestions.is_empty() {
            self.events.publish(PipelineEvent::FollowUps {
                request_id: request_id.clone(),
                suggestions: suggestions.clone(),
            });
        }
        suggestions
    }

    fn set_phase(&self, request_id: &RequestId, phase: AgentPhase) {
        self.events.publish(PipelineEvent::PhaseChanged {
            request_id: request_id.clone(),
            phase,
        });
    }
}

impl std::fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatAgent")
            .field("mode", &self.mode())
            .field("busy", &self.is_busy())
            .field("history", &self.history_stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use drekee_chats::InMemoryChatStore;
    use drekee_memory::InMemoryPersistence;
    use drekee_protocol::{CallOptions, GatewayError, ModelTarget, PromptRole};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    struct RecordedCall {
        target: ModelTarget,
        messages: Vec<PromptMessage>,
        visible_files: Vec<String>,
    }

    /// Replies from a queue and records each call with the generated files
    /// the chat held when the call started.
    struct ScriptedGateway {
        replies: Mutex<VecDeque<String>>,
        calls: Mutex<Vec<RecordedCall>>,
        log: Mutex<Vec<String>>,
        chats: Arc<InMemoryChatStore>,
    }

    impl ScriptedGateway {
        fn new(chats: Arc<InMemoryChatStore>, replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|reply| (*reply).to_owned()).collect()),
                calls: Mutex::new(Vec::new()),
                log: Mutex::new(Vec::new()),
                chats,
            }
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn call(
            &self,
            target: &ModelTarget,
            messages: &[PromptMessage],
            _options: &CallOptions,
        ) -> Result<String, GatewayError> {
            let index = self.calls.lock().len();
            self.log.lock().push(format!("start {index}"));
            let visible_files = match self.chats.find_current_chat().await {
                Ok(Some(chat)) => chat
                    .generated_files
                    .iter()
                    .map(|file| file.name.clone())
                    .collect(),
                _ => Vec::new(),
            };
            self.calls.lock().push(RecordedCall {
                target: target.clone(),
                messages: messages.to_vec(),
                visible_files,
            });
            tokio::task::yield_now().await;
            let reply = self.replies.lock().pop_front().unwrap_or_default();
            self.log.lock().push(format!("end {index}"));
            Ok(reply)
        }
    }

    /// Never answers; signals once a call is in flight.
    struct PendingGateway {
        started: Notify,
    }

    #[async_trait]
    impl ModelGateway for PendingGateway {
        async fn call(
            &self,
            _target: &ModelTarget,
            _messages: &[PromptMessage],
            _options: &CallOptions,
        ) -> Result<String, GatewayError> {
            self.started.notify_one();
            std::future::pending::<Result<String, GatewayError>>().await
        }
    }

    /// Answers from a queue; once it runs dry the call signals and never
    /// returns.
    struct StallingGateway {
        replies: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
        stalled: Notify,
    }

    impl StallingGateway {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|reply| (*reply).to_owned()).collect()),
                calls: AtomicUsize::new(0),
                stalled: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl ModelGateway for StallingGateway {
        async fn call(
            &self,
            _target: &ModelTarget,
            _messages: &[PromptMessage],
            _options: &CallOptions,
        ) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.replies.lock().pop_front();
            match next {
                Some(reply) => Ok(reply),
                None => {
                    self.stalled.notify_one();
                    std::future::pending::<Result<String, GatewayError>>().await
                }
            }
        }
    }

    fn agent_with(
        gateway: Arc<dyn ModelGateway>,
        chats: Arc<InMemoryChatStore>,
        config: RuntimeConfig,
    ) -> ChatAgent {
        let memory = MemoryStore::new(Arc::new(InMemoryPersistence::new()));
        ChatAgent::new(gateway, memory, chats, EventStreamHub::default(), config)
    }

    const PERSPECTIVE_ONE: &str = "Perspectiva um\n---FILES-JSON---{\"files\":[{\"name\":\"a.rs\",\"content\":\"1\"}]}---END-FILES-JSON---";
    const PERSPECTIVE_TWO: &str = "Perspectiva dois ---FILES-JSON---{\"files\":[{\"name\":\"a.rs\",\"content\":\"2\"},{\"name\":\"b.rs\",\"content\":\"x\"}]}---END-FILES-JSON---";

    #[tokio::test]
    async fn pro_stages_run_sequentially_and_merge_files_between_them() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(
            chats.clone(),
            &[PERSPECTIVE_ONE, PERSPECTIVE_TWO, "Síntese final"],
        ));
        let agent = agent_with(
            gateway.clone(),
            chats.clone(),
            RuntimeConfig::default().without_helpers(),
        );
        agent.set_mode(ModelMode::Pro);

        let outcome = agent.send(SendRequest::text("compare as abordagens")).await?;
        assert_eq!(outcome.response, "Síntese final");

        assert_eq!(
            *gateway.log.lock(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );

        let calls = gateway.calls.lock();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].visible_files.is_empty());
        assert_eq!(calls[1].visible_files, vec!["a.rs"]);
        assert_eq!(calls[2].visible_files, vec!["a.rs", "b.rs"]);

        let synthesis_user = calls[2]
            .messages
            .last()
            .ok_or_else(|| anyhow!("synthesis call had no messages"))?;
        assert_eq!(synthesis_user.role, PromptRole::User);
        assert!(synthesis_user.content.contains("Perspectiva um"));
        assert!(synthesis_user.content.contains("Perspectiva dois"));
        assert!(!synthesis_user.content.contains("FILES-JSON"));
        drop(calls);

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(
            chat.generated_files,
            vec![ChatFile::new("a.rs", "2"), ChatFile::new("b.rs", "x")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn stopping_mid_call_aborts_without_an_assistant_turn() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(PendingGateway {
            started: Notify::new(),
        });
        let agent = Arc::new(agent_with(
            gateway.clone(),
            chats.clone(),
            RuntimeConfig::default().without_helpers(),
        ));

        let task = tokio::spawn({
            let agent = agent.clone();
            async move { agent.send(SendRequest::text("explique o tokio")).await }
        });
        gateway.started.notified().await;

        let second = agent.send(SendRequest::text("outra pergunta")).await;
        assert!(matches!(second, Err(ChatError::Busy)));

        assert!(agent.stop_generation());
        let result = task.await?;
        assert!(matches!(result, Err(ChatError::Aborted)));
        assert!(!agent.is_busy());
        assert!(!agent.stop_generation());

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::User);

        let stats = agent.history_stats();
        assert_eq!((stats.user, stats.assistant), (1, 0));
        Ok(())
    }

    #[tokio::test]
    async fn stopping_during_the_second_perspective_skips_synthesis() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = StallingGateway::new(&[PERSPECTIVE_ONE]);
        let agent = Arc::new(agent_with(
            gateway.clone(),
            chats.clone(),
            RuntimeConfig::default().without_helpers(),
        ));
        agent.set_mode(ModelMode::Pro);

        let task = tokio::spawn({
            let agent = agent.clone();
            async move { agent.send(SendRequest::text("compare as abordagens")).await }
        });
        gateway.stalled.notified().await;

        assert!(agent.stop_generation());
        let result = task.await?;
        assert!(matches!(result, Err(ChatError::Aborted)));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        assert!(!agent.is_busy());

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(chat.messages.len(), 1);
        // files from the finished first perspective stay merged
        assert_eq!(chat.generated_files, vec![ChatFile::new("a.rs", "1")]);

        let turns = agent.memory().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(agent.history_stats().assistant, 0);
        Ok(())
    }

    #[tokio::test]
    async fn stopping_during_thinking_checks_skips_the_main_call() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = StallingGateway::new(&[]);
        let agent = Arc::new(agent_with(
            gateway.clone(),
            chats.clone(),
            RuntimeConfig::default(),
        ));
        let mut events = agent.events().subscribe();

        let task = tokio::spawn({
            let agent = agent.clone();
            async move { agent.send(SendRequest::text("explique lifetimes")).await }
        });
        gateway.stalled.notified().await;

        assert!(agent.stop_generation());
        let result = task.await?;
        assert!(matches!(result, Err(ChatError::Aborted)));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(agent.memory().turns().len(), 1);

        let mut aborted = false;
        while let Ok(event) = events.try_recv() {
            match event {
                PipelineEvent::ThinkingStep { .. } | PipelineEvent::ResponseReady { .. } => {
                    return Err(anyhow!("unexpected event after stop: {event:?}"));
                }
                PipelineEvent::Aborted { .. } => aborted = true,
                _ => {}
            }
        }
        assert!(aborted);
        Ok(())
    }

    #[tokio::test]
    async fn blank_attachments_reject_the_send_before_any_change() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(chats.clone(), &["nunca"]));
        let agent = agent_with(gateway.clone(), chats.clone(), RuntimeConfig::default());

        let request = SendRequest::text("veja os arquivos").with_attachments(vec![
            ChatFile::new("ok.txt", "conteúdo"),
            ChatFile::new("vazio.txt", "  \n"),
        ]);
        let result = agent.send(request).await;

        match result {
            Err(ChatError::EmptyAttachments(names)) => assert_eq!(names, vec!["vazio.txt"]),
            other => return Err(anyhow!("unexpected result: {other:?}")),
        }
        assert!(gateway.calls.lock().is_empty());
        assert!(chats.list_chats().await?.is_empty());
        assert_eq!(agent.history_stats().total, 0);
        assert!(!agent.is_busy());
        Ok(())
    }

    #[tokio::test]
    async fn blank_reply_shows_notice_and_logs_marker() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(chats.clone(), &["   "]));
        let agent = agent_with(
            gateway,
            chats.clone(),
            RuntimeConfig::default().without_helpers(),
        );
        agent.set_mode(ModelMode::Fast);

        let outcome = agent.send(SendRequest::text("oi")).await?;
        assert_eq!(outcome.response, EMPTY_RESPONSE_NOTICE);

        let turns = agent.memory().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, EMPTY_RESPONSE_MARKER);

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(chat.messages[1].content, EMPTY_RESPONSE_NOTICE);
        Ok(())
    }

    #[tokio::test]
    async fn first_exchange_titles_the_chat() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(chats.clone(), &["primeira", "segunda"]));
        let agent = agent_with(
            gateway,
            chats.clone(),
            RuntimeConfig::default().without_helpers(),
        );
        agent.set_mode(ModelMode::Fast);

        agent.send(SendRequest::text("Como configuro o tracing?")).await?;
        agent.send(SendRequest::text("E o filtro de níveis?")).await?;

        let chat = chats
            .find_current_chat()
            .await?
            .ok_or_else(|| anyhow!("chat missing"))?;
        assert_eq!(chat.title, "Como configuro o tracing?");
        assert_eq!(chat.messages.len(), 4);
        assert_eq!(agent.history_stats().total, 4);
        Ok(())
    }

    #[tokio::test]
    async fn reasoning_with_attachments_routes_to_the_file_model() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(chats.clone(), &["Revisado."]));
        let config = RuntimeConfig::default().without_helpers();
        let agent = agent_with(gateway.clone(), chats.clone(), config.clone());

        let request = SendRequest::text("revise este código")
            .with_attachments(vec![ChatFile::new("main.rs", "fn main() {}")]);
        let outcome = agent.send(request).await?;
        assert_eq!(outcome.response, "Revisado.");

        let calls = gateway.calls.lock();
        assert_eq!(calls[0].target, config.models.file_augmented);
        assert_eq!(calls[0].messages[1].role, PromptRole::System);
        assert!(calls[0].messages[1].content.starts_with("---FILE: main.rs---"));
        assert!(!calls[0].messages[0].content.contains("<think>"));
        Ok(())
    }

    #[tokio::test]
    async fn helpers_surround_a_reasoning_reply() -> anyhow::Result<()> {
        let chats = Arc::new(InMemoryChatStore::new());
        let gateway = Arc::new(ScriptedGateway::new(
            chats.clone(),
            &[
                "[{\"step\": \"Ler\"}, {\"step\": \"Responder\"}]",
                "<think>plano</think>Resposta final",
                "```json\n[\"Mais?\", \"Outro?\", \"Fim?\"]\n```",
            ],
        ));
        let config = RuntimeConfig::default();
        let agent = agent_with(gateway.clone(), chats, config.clone());
        let mut events = agent.events().subscribe();

        let outcome = agent.send(SendRequest::text("como funciona o borrow checker?")).await?;
        assert_eq!(outcome.response, "Resposta final");
        assert_eq!(outcome.reasoning.as_deref(), Some("plano"));
        assert_eq!(outcome.thinking_steps, vec!["Ler", "Responder"]);
        assert_eq!(outcome.follow_ups, vec!["Mais?", "Outro?", "Fim?"]);

        {
            let calls = gateway.calls.lock();
            assert_eq!(calls[0].target, config.models.helper);
            assert_eq!(calls[1].target, config.models.reasoning);
            assert!(calls[1].messages[0].content.contains("<think>...</think>"));
        }

        let mut thinking = 0;
        let mut last_phase = None;
        while let Ok(event) = events.try_recv() {
            match event {
                PipelineEvent::ThinkingStep { .. } => thinking += 1,
                PipelineEvent::PhaseChanged { phase, .. } => last_phase = Some(phase),
                _ => {}
            }
        }
        assert_eq!(thinking, 2);
        assert_eq!(last_phase, Some(AgentPhase::Idle));
        Ok(())
    }

    #[test]
    fn only_the_first_attachments_are_taken() -> anyhow::Result<()> {
        let files: Vec<ChatFile> = (0..5)
            .map(|index| ChatFile::new(format!("f{index}"), "x"))
            .collect();
        assert_eq!(take_attachments(files, 3)?.len(), 3);

        let blank_after_cut = vec![
            ChatFile::new("a", "x"),
            ChatFile::new("b", "x"),
            ChatFile::new("c", "x"),
            ChatFile::new("d", ""),
        ];
        assert_eq!(take_attachments(blank_after_cut, 3)?.len(), 3);
        Ok(())
    }
}
