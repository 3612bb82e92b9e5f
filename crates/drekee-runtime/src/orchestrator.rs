use std::sync::Arc;

use drekee_events::EventStreamHub;
use drekee_protocol::{
    ChatError, ChatFile, ChatId, ChatResult, ChatSessionPort, ModelGateway, ModelMode,
    ModelTarget, PipelineEvent, PipelineStage, PromptMessage, RequestId, ScoredTurn, merge_files,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::compose::{PromptComposer, render_file_block};
use crate::config::RuntimeConfig;
use crate::decode::{FilesBlock, decode_files, split_think};
use crate::persona::{
    FAST_PERSONA, FILE_AUGMENTED_PERSONA, persona_for, reasoning_persona, synthesis_persona,
    synthesis_prompt,
};

/// Call plan for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fast,
    Reasoning,
    /// Reasoning mode with user attachments, routed to the code model.
    FileAugmented,
    /// Two perspectives then a synthesis.
    Pro,
}

impl Strategy {
    pub fn select(mode: ModelMode, has_user_attachments: bool) -> Self {
        match mode {
            ModelMode::Fast => Self::Fast,
            ModelMode::Reasoning if has_user_attachments => Self::FileAugmented,
            ModelMode::Reasoning => Self::Reasoning,
            ModelMode::Pro => Self::Pro,
        }
    }

    /// Number of model calls the strategy makes.
    pub fn call_count(&self) -> usize {
        match self {
            Self::Pro => 3,
            Self::Fast | Self::Reasoning | Self::FileAugmented => 1,
        }
    }
}

/// Everything a strategy needs to know about the turn being answered.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub request_id: &'a RequestId,
    pub chat_id: &'a ChatId,
    pub user_message: &'a str,
    pub memory: &'a [ScoredTurn],
    /// Files placed in the file block of every call.
    pub files: &'a [ChatFile],
    /// Prior history, not including `user_message`.
    pub history: &'a [PromptMessage],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrchestratedResponse {
    /// Display text with think and file blocks removed.
    pub response: String,
    pub reasoning: Option<String>,
    /// Files generated by the final call.
    pub attachments: Vec<ChatFile>,
}

/// Runs the model calls of a [`Strategy`] strictly in sequence, absorbing
/// generated files into the chat after every call.
#[derive(Clone)]
pub struct ResponseOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    chats: Arc<dyn ChatSessionPort>,
    events: EventStreamHub,
    config: RuntimeConfig,
}

impl ResponseOrchestrator {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        chats: Arc<dyn ChatSessionPort>,
        events: EventStreamHub,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            gateway,
            chats,
            events,
            config,
        }
    }

    #[instrument(
        skip_all,
        fields(request_id = %turn.request_id, chat_id = %turn.chat_id, strategy = ?strategy)
    )]
    pub async fn run(
        &self,
        strategy: Strategy,
        turn: TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> ChatResult<OrchestratedResponse> {
        match strategy {
            Strategy::Fast => {
                let messages = PromptComposer::compose(
                    FAST_PERSONA,
                    turn.memory,
                    turn.files,
                    turn.history,
                    turn.user_message,
                );
                let raw = self
                    .call_stage(
                        &turn,
                        PipelineStage::Fast,
                        &self.config.models.fast,
                        &messages,
                        cancel,
                    )
                    .await?;
                let (response, attachments) = self.absorb_files(&turn, &raw).await?;
                Ok(OrchestratedResponse {
                    response,
                    reasoning: None,
                    attachments,
                })
            }
            Strategy::Reasoning => {
                let messages = PromptComposer::compose(
                    &reasoning_persona(),
                    turn.memory,
                    turn.files,
                    turn.history,
                    turn.user_message,
                );
                let raw = self
                    .call_stage(
                        &turn,
                        PipelineStage::Reasoning,
                        &self.config.models.reasoning,
                        &messages,
                        cancel,
                    )
                    .await?;
                let split = split_think(&raw);
                let (response, attachments) = self.absorb_files(&turn, &split.response).await?;
                Ok(OrchestratedResponse {
                    response,
                    reasoning: (!split.reasoning.is_empty()).then_some(split.reasoning),
                    attachments,
                })
            }
            Strategy::FileAugmented => {
                let messages = PromptComposer::compose(
                    FILE_AUGMENTED_PERSONA,
                    turn.memory,
                    turn.files,
                    turn.history,
                    turn.user_message,
                );
                let raw = self
                    .call_stage(
                        &turn,
                        PipelineStage::FileAugmented,
                        &self.config.models.file_augmented,
                        &messages,
                        cancel,
                    )
                    .await?;
                let (response, attachments) = self.absorb_files(&turn, &raw).await?;
                Ok(OrchestratedResponse {
                    response,
                    reasoning: None,
                    attachments,
                })
            }
            Strategy::Pro => self.run_pro(&turn, cancel).await,
        }
    }

    async fn run_pro(
        &self,
        turn: &TurnContext<'_>,
        cancel: &CancellationToken,
    ) -> ChatResult<OrchestratedResponse> {
        let target = &self.config.models.pro;
        let perspective_messages = PromptComposer::compose(
            &persona_for(ModelMode::Pro),
            turn.memory,
            turn.files,
            turn.history,
            turn.user_message,
        );

        let mut perspectives = Vec::with_capacity(2);
        for index in 1..=2 {
            let raw = self
                .call_stage(
                    turn,
                    PipelineStage::Perspective { index },
                    target,
                    &perspective_messages,
                    cancel,
                )
                .await?;
            let (text, _) = self.absorb_files(turn, &raw).await?;
            perspectives.push(text);
        }

        let mut synthesis = vec![PromptMessage::system(synthesis_persona())];
        if let Some(block) = render_file_block(turn.files) {
            synthesis.push(PromptMessage::system(block));
        }
        synthesis.push(PromptMessage::user(synthesis_prompt(
            turn.user_message,
            &perspectives[0],
            &perspectives[1],
        )));

        let raw = self
            .call_stage(turn, PipelineStage::Synthesis, target, &synthesis, cancel)
            .await?;
        let (response, attachments) = self.absorb_files(turn, &raw).await?;
        Ok(OrchestratedResponse {
            response,
            reasoning: None,
            attachments,
        })
    }

    /// One model call that resolves to `Aborted` as soon as `cancel` fires.
    pub async fn call_stage(
        &self,
        turn: &TurnContext<'_>,
        stage: PipelineStage,
        target: &ModelTarget,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> ChatResult<String> {
        if cancel.is_cancelled() {
            return Err(ChatError::Aborted);
        }
        self.events.publish(PipelineEvent::StageStarted {
            request_id: turn.request_id.clone(),
            stage,
        });
        debug!(
            ?stage,
            provider = %target.provider,
            model = %target.model,
            messages = messages.len(),
            "calling model"
        );

        let options = self.config.options_for(target);
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Aborted),
            result = self.gateway.call(target, messages, &options) => result.map_err(ChatError::from),
        }?;

        self.events.publish(PipelineEvent::StageCompleted {
            request_id: turn.request_id.clone(),
            stage,
            chars: text.chars().count(),
        });
        Ok(text)
    }

    /// Strip a file block from `text`, merging its files into the chat.
    /// Returns the display text and the extracted files.
    async fn absorb_files(
        &self,
        turn: &TurnContext<'_>,
        text: &str,
    ) -> ChatResult<(String, Vec<ChatFile>)> {
        let block = decode_files(text);
        if let FilesBlock::Invalid { reason } = &block {
            warn!(request_id = %turn.request_id, %reason, "ignoring malformed file block");
        }
        let files = block.files().to_vec();
        let display = block.display_text(text);
        if files.is_empty() {
            return Ok((display, files));
        }

        let mut generated = self.chats.generated_files(turn.chat_id).await?;
        merge_files(&mut generated, files.iter().cloned());
        self.chats.set_generated_files(turn.chat_id, generated).await?;

        self.events.publish(PipelineEvent::FilesGenerated {
            request_id: turn.request_id.clone(),
            names: files.iter().map(|file| file.name.clone()).collect(),
        });
        debug!(files = files.len(), "generated files stored");
        Ok((display, files))
    }
}
