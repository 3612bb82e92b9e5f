//! # drekee-protocol: shared contract for the Drekee chat client
//!
//! This crate defines the types, error taxonomy, and port traits shared by
//! the memory engine, the orchestration runtime, and the outer surfaces.
//!
//! It carries no runtime dependencies (no tokio, no HTTP client) so it can be
//! used as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (ChatId, RequestId)
//! - [`memory`]: ConversationTurn, ContextTag, preferences, project memory, snapshots
//! - [`chat`]: ChatSession, ChatMessage, ChatFile
//! - [`model`]: ModelMode, ModelTarget, PromptMessage, CallOptions
//! - [`event`]: PipelineEvent, PipelineStage, AgentPhase
//! - [`ports`]: ModelGateway, PersistencePort, ChatSessionPort
//! - [`error`]: ChatError, GatewayError, ChatResult

pub mod chat;
pub mod error;
pub mod event;
pub mod ids;
pub mod memory;
pub mod model;
pub mod ports;

pub use chat::{ChatFile, ChatMessage, ChatSession, merge_files};
pub use error::{ChatError, ChatResult, GatewayError};
pub use event::{AgentPhase, PipelineEvent, PipelineStage};
pub use ids::{ChatId, RequestId};
pub use memory::{
    ContextTag, ConversationTurn, FeedbackRecord, MemorySnapshot, MemoryStats, PreferenceValue,
    ProjectEntry, Role, ScoredProject, ScoredTurn, UserMemory, now_millis,
};
pub use model::{CallOptions, ModelMode, ModelTarget, PromptMessage, PromptRole, Provider};
pub use ports::{ChatSessionPort, ModelGateway, PersistencePort};
