//! Memory types: conversation turns, preferences, project snippets, and the
//! persisted snapshot.
//!
//! Field names serialize in camelCase so snapshots written by earlier clients
//! load unchanged.

use std::fmt;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Author of a logged turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse intent classification of a message.
///
/// Variant order is the classifier's priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextTag {
    Code,
    Debug,
    Help,
    Create,
    Fix,
    General,
}

impl ContextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Debug => "debug",
            Self::Help => "help",
            Self::Create => "create",
            Self::Fix => "fix",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged message with its derived keywords and context tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    /// Stored content, already truncated.
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub keywords: Vec<String>,
    pub context: ContextTag,
}

/// Explicit user feedback captured alongside an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub message: String,
    pub response: String,
    pub feedback: String,
    pub timestamp: i64,
}

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Text(String),
    Feedback(FeedbackRecord),
}

impl PreferenceValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Feedback(_) => None,
        }
    }
}

impl From<&str> for PreferenceValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PreferenceValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Durable user preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMemory {
    #[serde(default)]
    pub preferences: IndexMap<String, PreferenceValue>,
}

/// A remembered code snippet, grouped by language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub code: String,
    pub language: String,
    pub description: String,
    pub timestamp: i64,
    pub keywords: Vec<String>,
    /// Length of `code` in characters.
    pub size: usize,
}

/// Everything the memory store persists in its slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    #[serde(default)]
    pub conversation_memory: Vec<ConversationTurn>,
    #[serde(default)]
    pub user_memory: UserMemory,
    #[serde(default)]
    pub project_memory: IndexMap<String, Vec<ProjectEntry>>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.conversation_memory.is_empty()
            && self.user_memory.preferences.is_empty()
            && self.project_memory.is_empty()
    }
}

/// A turn selected for re-injection, with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTurn {
    #[serde(flatten)]
    pub turn: ConversationTurn,
    pub relevance_score: f64,
}

/// A remembered project ranked against a snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredProject {
    #[serde(flatten)]
    pub project: ProjectEntry,
    pub similarity_score: f64,
}

/// Aggregate counts over the memory store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub turn_count: usize,
    pub preference_count: usize,
    pub language_count: usize,
    pub total_projects: usize,
}
