use std::collections::VecDeque;

use drekee_protocol::{PromptMessage, PromptRole};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub user: usize,
    pub assistant: usize,
    pub max: usize,
}

/// Rolling role/content window passed to every prompt. The oldest entry is
/// dropped once `limit` is exceeded.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<PromptMessage>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, message: PromptMessage) {
        self.entries.push_back(message);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    pub fn messages(&self) -> Vec<PromptMessage> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> HistoryStats {
        let count = |role: PromptRole| {
            self.entries
                .iter()
                .filter(|message| message.role == role)
                .count()
        };
        HistoryStats {
            total: self.entries.len(),
            user: count(PromptRole::User),
            assistant: count(PromptRole::Assistant),
            max: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_entries_are_dropped_past_the_limit() {
        let mut history = ConversationHistory::new(3);
        for index in 0..5 {
            history.push(PromptMessage::user(format!("m{index}")));
        }

        let contents: Vec<String> = history
            .messages()
            .into_iter()
            .map(|message| message.content)
            .collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn stats_count_roles() {
        let mut history = ConversationHistory::new(50);
        history.push(PromptMessage::user("a"));
        history.push(PromptMessage::assistant("b"));
        history.push(PromptMessage::user("c"));

        assert_eq!(
            history.stats(),
            HistoryStats {
                total: 3,
                user: 2,
                assistant: 1,
                max: 50,
            }
        );

        history.clear();
        assert!(history.is_empty());
    }
}
