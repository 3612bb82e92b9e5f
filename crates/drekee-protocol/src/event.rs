//! Structured events emitted by the chat pipeline.
//!
//! The pipeline never touches a presentation layer directly; renderers
//! subscribe to these events instead.

use serde::{Deserialize, Serialize};

use crate::chat::ChatFile;
use crate::ids::{ChatId, RequestId};
use crate::model::ModelMode;

/// Send lifecycle of an agent: `idle -> sending -> rendering -> idle`,
/// with `aborted` reachable from `sending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    #[default]
    Idle,
    Sending,
    Rendering,
    Aborted,
}

/// One model call inside a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineStage {
    Fast,
    Reasoning,
    FileAugmented,
    Perspective { index: u8 },
    Synthesis,
    ThinkingChecks,
    FollowUps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    SendStarted {
        request_id: RequestId,
        chat_id: Option<ChatId>,
        mode: ModelMode,
    },
    PhaseChanged {
        request_id: RequestId,
        phase: AgentPhase,
    },
    StageStarted {
        request_id: RequestId,
        stage: PipelineStage,
    },
    StageCompleted {
        request_id: RequestId,
        stage: PipelineStage,
        chars: usize,
    },
    ThinkingStep {
        request_id: RequestId,
        index: usize,
        text: String,
    },
    FilesGenerated {
        request_id: RequestId,
        names: Vec<String>,
    },
    ResponseReady {
        request_id: RequestId,
        response: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<ChatFile>,
    },
    FollowUps {
        request_id: RequestId,
        suggestions: Vec<String>,
    },
    Aborted {
        request_id: RequestId,
    },
    Failed {
        request_id: RequestId,
        message: String,
        configuration: bool,
    },
}

impl PipelineEvent {
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::SendStarted { request_id, .. }
            | Self::PhaseChanged { request_id, .. }
            | Self::StageStarted { request_id, .. }
            | Self::StageCompleted { request_id, .. }
            | Self::ThinkingStep { request_id, .. }
            | Self::FilesGenerated { request_id, .. }
            | Self::ResponseReady { request_id, .. }
            | Self::FollowUps { request_id, .. }
            | Self::Aborted { request_id }
            | Self::Failed { request_id, .. } => request_id,
        }
    }
}
