use drekee_protocol::{CallOptions, ModelMode, ModelTarget, Provider};
use serde::{Deserialize, Serialize};

/// Provider and model used for each kind of call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub fast: ModelTarget,
    pub reasoning: ModelTarget,
    pub pro: ModelTarget,
    /// Used in reasoning mode when the user attached files.
    pub file_augmented: ModelTarget,
    /// Thinking checks and follow-up suggestions.
    pub helper: ModelTarget,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            fast: ModelTarget::groq("llama-3.1-8b-instant"),
            reasoning: ModelTarget::groq("qwen/qwen3-32b"),
            pro: ModelTarget::groq("llama-3.1-8b-instant"),
            file_augmented: ModelTarget::mistral("codestral-latest"),
            helper: ModelTarget::groq("llama-3.1-8b-instant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Role/content pairs kept in the rolling prompt history.
    pub history_limit: usize,
    pub max_attachments: usize,
    /// Generated files re-sent when the user attached nothing.
    pub max_reused_files: usize,
    pub default_mode: ModelMode,
    pub models: ModelCatalog,
    pub groq_options: CallOptions,
    pub mistral_options: CallOptions,
    pub thinking_checks: bool,
    pub follow_ups: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            max_attachments: 3,
            max_reused_files: 3,
            default_mode: ModelMode::Reasoning,
            models: ModelCatalog::default(),
            groq_options: CallOptions::default(),
            mistral_options: CallOptions {
                max_tokens: 2048,
                ..CallOptions::default()
            },
            thinking_checks: true,
            follow_ups: true,
        }
    }
}

impl RuntimeConfig {
    pub fn options_for(&self, target: &ModelTarget) -> CallOptions {
        match target.provider {
            Provider::Groq => self.groq_options,
            Provider::Mistral => self.mistral_options,
        }
    }

    /// Config with both helper calls switched off.
    pub fn without_helpers(mut self) -> Self {
        self.thinking_checks = false;
        self.follow_ups = false;
        self
    }
}
