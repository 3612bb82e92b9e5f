use drekee_protocol::{
    ConversationTurn, FeedbackRecord, MemorySnapshot, MemoryStats, PreferenceValue, ProjectEntry,
    Role, ScoredProject, ScoredTurn, UserMemory,
};
use indexmap::IndexMap;

use crate::context::detect_context;
use crate::keywords::extract_keywords;

pub const MAX_CONVERSATION_TURNS: usize = 15;
pub const MAX_PROJECTS_PER_LANGUAGE: usize = 50;
pub const MAX_STORED_CHARS: usize = 500;
pub const MAX_RELEVANT_TURNS: usize = 5;
pub const MAX_SIMILAR_PROJECTS: usize = 3;

const RECENT_WINDOW_MS: i64 = 5 * 60 * 1000;
const WARM_WINDOW_MS: i64 = 15 * 60 * 1000;

pub const COMPLEXITY_KEY: &str = "complexity";
pub const LANGUAGE_KEY: &str = "language";
pub const PREFERRED_LANGUAGE_KEY: &str = "preferredLanguage";
pub const FEEDBACK_KEY: &str = "lastFeedback";

/// Programming languages recognised in user messages, in scan order.
pub const CODE_LANGUAGES: &[&str] = &["javascript", "python", "java", "react", "vue", "angular"];

/// In-process memory state: the bounded turn log, user preferences and
/// per-language project snippets.
///
/// Every operation is total. Time-dependent operations take `now` so callers
/// and tests control the clock; persistence lives in [`crate::MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryBank {
    turns: Vec<ConversationTurn>,
    preferences: IndexMap<String, PreferenceValue>,
    projects: IndexMap<String, Vec<ProjectEntry>>,
}

impl MemoryBank {
    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        Self {
            turns: snapshot.conversation_memory,
            preferences: snapshot.user_memory.preferences,
            projects: snapshot.project_memory,
        }
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            conversation_memory: self.turns.clone(),
            user_memory: UserMemory {
                preferences: self.preferences.clone(),
            },
            project_memory: self.projects.clone(),
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn add_turn_at(&mut self, role: Role, content: &str, timestamp: i64) {
        self.turns.push(ConversationTurn {
            role,
            content: truncate_content(content),
            timestamp,
            keywords: extract_keywords(content),
            context: detect_context(content),
        });

        if self.turns.len() > MAX_CONVERSATION_TURNS {
            let overflow = self.turns.len() - MAX_CONVERSATION_TURNS;
            self.turns.drain(..overflow);
        }
    }

    /// Up to five stored turns ranked against `query`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn relevant_context_at(&self, query: &str, now: i64) -> Vec<ScoredTurn> {
        let query_keywords = extract_keywords(query);
        let query_context = detect_context(query);

        let mut scored: Vec<ScoredTurn> = self
            .turns
            .iter()
            .filter_map(|turn| {
                let mut score = keyword_overlap(&query_keywords, &turn.keywords);
                if turn.context == query_context {
                    score += 3.0;
                }
                score += recency_bonus(now.saturating_sub(turn.timestamp));

                (score > 0.0).then(|| ScoredTurn {
                    turn: turn.clone(),
                    relevance_score: score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        scored.truncate(MAX_RELEVANT_TURNS);
        scored
    }

    pub fn update_preference(&mut self, key: impl Into<String>, value: impl Into<PreferenceValue>) {
        self.preferences.insert(key.into(), value.into());
    }

    pub fn preference(&self, key: &str) -> Option<&PreferenceValue> {
        self.preferences.get(key)
    }

    /// Learn style, language and code preferences from trigger phrases in
    /// `user_message`. Returns whether any preference changed.
    ///
    /// Style and language triggers are case-sensitive. Code languages are
    /// matched on the lowercased message and the last match in
    /// [`CODE_LANGUAGES`] order wins.
    pub fn learn_from_interaction_at(
        &mut self,
        user_message: &str,
        ai_response: &str,
        feedback: Option<&str>,
        now: i64,
    ) -> bool {
        let mut learned = false;

        if user_message.contains("mais simples") || user_message.contains("resumido") {
            self.update_preference(COMPLEXITY_KEY, "simple");
            learned = true;
        } else if user_message.contains("detalhado") || user_message.contains("completo") {
            self.update_preference(COMPLEXITY_KEY, "detailed");
            learned = true;
        }

        if user_message.contains("português") || user_message.contains("pt-br") {
            self.update_preference(LANGUAGE_KEY, "pt-br");
            learned = true;
        } else if user_message.contains("inglês") {
            self.update_preference(LANGUAGE_KEY, "en");
            learned = true;
        }

        let lowered = user_message.to_lowercase();
        for language in CODE_LANGUAGES {
            if lowered.contains(language) {
                self.update_preference(PREFERRED_LANGUAGE_KEY, *language);
                learned = true;
            }
        }

        if let Some(feedback) = feedback {
            self.update_preference(
                FEEDBACK_KEY,
                PreferenceValue::Feedback(FeedbackRecord {
                    message: user_message.to_owned(),
                    response: ai_response.to_owned(),
                    feedback: feedback.to_owned(),
                    timestamp: now,
                }),
            );
            learned = true;
        }

        learned
    }

    pub fn add_project_at(
        &mut self,
        name: &str,
        code: &str,
        language: &str,
        description: &str,
        timestamp: i64,
    ) {
        let entry = ProjectEntry {
            name: name.to_owned(),
            code: code.to_owned(),
            language: language.to_owned(),
            description: description.to_owned(),
            timestamp,
            keywords: extract_keywords(&format!("{code} {description}")),
            size: code.chars().count(),
        };

        let entries = self.projects.entry(language.to_owned()).or_default();
        entries.push(entry);

        if entries.len() > MAX_PROJECTS_PER_LANGUAGE {
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            entries.truncate(MAX_PROJECTS_PER_LANGUAGE);
        }
    }

    pub fn projects(&self, language: &str) -> &[ProjectEntry] {
        self.projects.get(language).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Up to three stored projects for `language` ranked against `snippet`.
    pub fn similar_code(&self, snippet: &str, language: &str) -> Vec<ScoredProject> {
        let Some(entries) = self.projects.get(language) else {
            return Vec::new();
        };

        let snippet_keywords = extract_keywords(snippet);
        let snippet_size = snippet.chars().count();

        let mut scored: Vec<ScoredProject> = entries
            .iter()
            .filter_map(|project| {
                let mut score = keyword_overlap(&snippet_keywords, &project.keywords);
                let size_diff = project.size.abs_diff(snippet_size);
                if size_diff < 1000 {
                    score += 1.0;
                } else if size_diff < 5000 {
                    score += 0.5;
                }

                (score > 0.0).then(|| ScoredProject {
                    project: project.clone(),
                    similarity_score: score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        scored.truncate(MAX_SIMILAR_PROJECTS);
        scored
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            turn_count: self.turns.len(),
            preference_count: self.preferences.len(),
            language_count: self.projects.len(),
            total_projects: self.projects.values().map(Vec::len).sum(),
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.preferences.clear();
        self.projects.clear();
    }
}

/// Keep at most [`MAX_STORED_CHARS`] characters, marking the cut with `...`.
pub fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_STORED_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_owned(),
    }
}

fn keyword_overlap(query: &[String], stored: &[String]) -> f64 {
    let shared = query.iter().filter(|keyword| stored.contains(keyword)).count();
    shared as f64 * 2.0
}

fn recency_bonus(age_ms: i64) -> f64 {
    if age_ms < RECENT_WINDOW_MS {
        1.0
    } else if age_ms < WARM_WINDOW_MS {
        0.5
    } else {
        0.0
    }
}
