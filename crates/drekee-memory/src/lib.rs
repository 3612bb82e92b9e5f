//! Heuristic memory for the Drekee chat client.
//!
//! Conversation turns are logged with extracted keywords and a coarse
//! context tag, then scored against new queries so the most relevant prior
//! turns can be re-injected into the prompt. User preferences and
//! per-language code snippets live alongside them in the same snapshot.

pub mod bank;
pub mod context;
pub mod keywords;
pub mod persistence;
pub mod store;

pub use bank::{
    CODE_LANGUAGES, COMPLEXITY_KEY, FEEDBACK_KEY, LANGUAGE_KEY, MAX_CONVERSATION_TURNS,
    MAX_PROJECTS_PER_LANGUAGE, MAX_RELEVANT_TURNS, MAX_SIMILAR_PROJECTS, MAX_STORED_CHARS,
    MemoryBank, PREFERRED_LANGUAGE_KEY, truncate_content,
};
pub use context::{CONTEXT_TRIGGERS, detect_context};
pub use keywords::{MAX_KEYWORDS, STOP_WORDS, extract_keywords, is_stop_word};
pub use persistence::{
    FileMemoryPersistence, InMemoryPersistence, MEMORY_FILE_NAME, decode_snapshot,
};
pub use store::MemoryStore;
