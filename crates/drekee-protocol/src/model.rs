//! Model selection and the message shape sent to a provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::memory::Role;

/// Call strategy chosen by the user.
///
/// Serialized names match what earlier clients stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelMode {
    /// One call, raw text returned.
    #[serde(rename = "rapido")]
    Fast,
    /// One call with a think-delimited deliberation region.
    #[default]
    #[serde(rename = "raciocinio")]
    Reasoning,
    /// Two perspective calls followed by a synthesis call.
    #[serde(rename = "pro")]
    Pro,
}

impl ModelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "rapido",
            Self::Reasoning => "raciocinio",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for ModelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fast" | "rapido" => Ok(Self::Fast),
            "reasoning" | "raciocinio" => Ok(Self::Reasoning),
            "pro" => Ok(Self::Pro),
            other => Err(format!("unknown model mode: {other}")),
        }
    }
}

/// Hosted model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Mistral,
}

impl Provider {
    /// Environment variable holding the provider API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groq => f.write_str("Groq"),
            Self::Mistral => f.write_str("Mistral"),
        }
    }
}

/// Provider plus model id for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTarget {
    pub provider: Provider,
    pub model: String,
}

impl ModelTarget {
    pub fn groq(model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Groq,
            model: model.into(),
        }
    }

    pub fn mistral(model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Mistral,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// One entry of the ordered message list sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(PromptRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(PromptRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(PromptRole::Assistant, content)
    }
}

/// Sampling options forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 8192,
            top_p: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_mode_serializes_legacy_names() {
        assert_eq!(serde_json::to_string(&ModelMode::Fast).unwrap(), "\"rapido\"");
        assert_eq!(
            serde_json::to_string(&ModelMode::Reasoning).unwrap(),
            "\"raciocinio\""
        );
        let back: ModelMode = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(back, ModelMode::Pro);
    }

    #[test]
    fn model_mode_parses_both_vocabularies() {
        assert_eq!("fast".parse::<ModelMode>().unwrap(), ModelMode::Fast);
        assert_eq!("Raciocinio".parse::<ModelMode>().unwrap(), ModelMode::Reasoning);
        assert!("turbo".parse::<ModelMode>().is_err());
    }

    #[test]
    fn prompt_message_serializes_lowercase_role() {
        let json = serde_json::to_value(PromptMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "x");
    }
}
