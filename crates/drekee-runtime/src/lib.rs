//! Drekee chat pipeline.
//!
//! [`ChatAgent`] owns one conversation loop: it composes prompts with
//! [`PromptComposer`], runs them through a [`ResponseOrchestrator`] strategy,
//! decodes think and file blocks from the replies, and records the result in
//! the chat store, the rolling history and memory. Progress is published on
//! an [`drekee_events::EventStreamHub`] rather than rendered directly.

pub mod agent;
pub mod compose;
pub mod config;
pub mod decode;
pub mod helpers;
pub mod history;
pub mod orchestrator;
pub mod persona;

pub use agent::{
    ChatAgent, EMPTY_RESPONSE_MARKER, EMPTY_RESPONSE_NOTICE, SendOutcome, SendRequest,
    take_attachments,
};
pub use compose::{PromptComposer, render_file_block, render_memory_context};
pub use config::{ModelCatalog, RuntimeConfig};
pub use decode::{FilesBlock, ThinkSplit, decode_files, split_think};
pub use helpers::{parse_follow_ups, parse_thinking_steps};
pub use history::{ConversationHistory, HistoryStats};
pub use orchestrator::{OrchestratedResponse, ResponseOrchestrator, Strategy, TurnContext};
